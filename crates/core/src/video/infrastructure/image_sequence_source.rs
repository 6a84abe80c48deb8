use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::video_source::{CameraError, VideoSource};

enum Backing {
    Files { origin: PathBuf },
    Memory(Vec<Frame>),
}

/// Replays still images as if they came from a camera, looping forever.
///
/// File-backed sources decode every image on `start` and drop the pixels on
/// `stop`, mirroring how a device is opened and released.
pub struct ImageSequenceSource {
    backing: Backing,
    loaded: Vec<Frame>,
    active: bool,
    cursor: usize,
    next_sequence: u64,
}

impl ImageSequenceSource {
    /// Source over a single image file or every image in a directory
    /// (sorted by file name).
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::with_backing(Backing::Files {
            origin: path.into(),
        })
    }

    /// Source over frames already in memory.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self::with_backing(Backing::Memory(frames))
    }

    fn with_backing(backing: Backing) -> Self {
        Self {
            backing,
            loaded: Vec::new(),
            active: false,
            cursor: 0,
            next_sequence: 0,
        }
    }

    fn decode_all(origin: &Path) -> Result<Vec<Frame>, CameraError> {
        let paths = list_images(origin)?;
        if paths.is_empty() {
            return Err(CameraError::Access(format!(
                "no images found at {}",
                origin.display()
            )));
        }
        paths
            .iter()
            .map(|path| {
                image::open(path)
                    .map(|img| Frame::from_rgb_image(img.into_rgb8(), 0))
                    .map_err(|e| CameraError::Access(format!("{}: {e}", path.display())))
            })
            .collect()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(origin: &Path) -> Result<Vec<PathBuf>, CameraError> {
    if origin.is_file() {
        return Ok(vec![origin.to_path_buf()]);
    }
    let entries = std::fs::read_dir(origin)
        .map_err(|e| CameraError::Access(format!("{}: {e}", origin.display())))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

impl VideoSource for ImageSequenceSource {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.active {
            return Ok(());
        }
        self.loaded = match &self.backing {
            Backing::Files { origin } => Self::decode_all(origin)?,
            Backing::Memory(frames) if frames.is_empty() => {
                return Err(CameraError::Access("no frames to replay".to_string()));
            }
            Backing::Memory(frames) => frames.clone(),
        };
        self.cursor = 0;
        self.active = true;
        log::info!("Started {}", self.describe());
        Ok(())
    }

    fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.loaded.clear();
        log::info!("Stopped {}", self.describe());
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn current_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.active {
            return Err(CameraError::NotActive);
        }
        let frame = self.loaded[self.cursor % self.loaded.len()].clone();
        self.cursor = (self.cursor + 1) % self.loaded.len();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Ok(frame.with_sequence(sequence))
    }

    fn describe(&self) -> String {
        match &self.backing {
            Backing::Files { origin } => format!("image sequence {}", origin.display()),
            Backing::Memory(frames) => format!("in-memory sequence ({} frames)", frames.len()),
        }
    }
}
