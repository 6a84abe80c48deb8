use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, EXPRESSION_MODEL_NAME, EXPRESSION_MODEL_URL, FACE_MODEL_NAME, FACE_MODEL_URL,
};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// A downloadable model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub url: &'static str,
}

pub const FACE_MODEL: ModelSpec = ModelSpec {
    name: FACE_MODEL_NAME,
    url: FACE_MODEL_URL,
};

pub const EXPRESSION_MODEL: ModelSpec = ModelSpec {
    name: EXPRESSION_MODEL_NAME,
    url: EXPRESSION_MODEL_URL,
};

/// Locates `spec` on disk, downloading it into the cache if needed.
///
/// Lookup order: bundled directory, user cache directory, then download.
pub fn resolve(
    spec: ModelSpec,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(found) = find_local(spec.name, bundled_dir, &model_cache_dir()?) {
        return Ok(found);
    }

    let cache_dir = model_cache_dir()?;
    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    let dest = cache_dir.join(spec.name);
    log::info!("Downloading {} from {}", spec.name, spec.url);
    download(spec.url, &dest, progress)?;
    Ok(dest)
}

fn find_local(name: &str, bundled_dir: Option<&Path>, cache_dir: &Path) -> Option<PathBuf> {
    bundled_dir
        .map(|dir| dir.join(name))
        .into_iter()
        .chain(std::iter::once(cache_dir.join(name)))
        .find(|path| path.is_file())
}

/// Platform cache directory holding downloaded models.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams `url` into `dest` via a `.part` file that is renamed on success
/// and removed on failure.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = stream_to(url, &temp_path, progress).and_then(|()| {
        fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
            path: dest.to_path_buf(),
            source: e,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn stream_to(url: &str, path: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: path.to_path_buf(),
        source: e,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(path).map_err(write_err)?;
    let mut buf = vec![0u8; 256 * 1024];
    let mut downloaded = 0u64;
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_local_prefers_bundled_copy() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("bundled");
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&bundled).unwrap();
        fs::create_dir_all(&cache).unwrap();
        fs::write(bundled.join("m.onnx"), b"bundled").unwrap();
        fs::write(cache.join("m.onnx"), b"cached").unwrap();

        let found = find_local("m.onnx", Some(&bundled), &cache).unwrap();
        assert_eq!(found, bundled.join("m.onnx"));
    }

    #[test]
    fn test_find_local_falls_back_to_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().to_path_buf();
        fs::write(cache.join("m.onnx"), b"cached").unwrap();

        let found = find_local("m.onnx", Some(Path::new("/nonexistent")), &cache).unwrap();
        assert_eq!(found, cache.join("m.onnx"));
    }

    #[test]
    fn test_find_local_missing_everywhere() {
        let tmp = TempDir::new().unwrap();
        assert!(find_local("m.onnx", None, tmp.path()).is_none());
    }

    #[test]
    fn test_model_cache_dir_is_app_scoped() {
        let path = model_cache_dir().unwrap();
        assert!(path.ends_with(Path::new(APP_DIR_NAME).join("models")));
    }

    #[test]
    fn test_download_invalid_url_leaves_no_files() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
