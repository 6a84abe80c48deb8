mod settings;

use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use clap::Parser;

use facemood_core::emotion::domain::expression_model::ModelLoader;
use facemood_core::emotion::domain::synthetic_predictions::SyntheticPredictions;
use facemood_core::emotion::emotion_detector::{EmotionDetector, FallbackPolicy};
use facemood_core::emotion::infrastructure::onnx_expression_model::OnnxModelLoader;
use facemood_core::emotion::infrastructure::placeholder_model::UnavailableModelLoader;
use facemood_core::presentation::dashboard::{self, CAMERA_FAILURE_MESSAGE};
use facemood_core::presentation::export;
use facemood_core::sampling::domain::dashboard_snapshot::{CameraStatus, ModelStatus};
use facemood_core::sampling::infrastructure::snapshot_feed::SnapshotSubscriber;
use facemood_core::sampling::infrastructure::threaded_sampler::{self, SamplerConfig};
use facemood_core::sampling::sampling_logger::LogSamplingLogger;
use facemood_core::shared::model_resolver::{self, EXPRESSION_MODEL, FACE_MODEL};
use facemood_core::video::domain::video_source::VideoSource;
use facemood_core::video::infrastructure::image_sequence_source::ImageSequenceSource;

use settings::Settings;

const DEFAULT_DURATION_SECS: u64 = 10;
const RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Live facial emotion sampling with a terminal dashboard.
#[derive(Parser)]
#[command(name = "facemood")]
struct Cli {
    /// Replay an image file or a directory of images instead of the webcam.
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Webcam index (defaults to the front-facing device).
    #[arg(long)]
    camera: Option<u32>,

    /// Milliseconds between sampling ticks.
    #[arg(long)]
    period_ms: Option<u64>,

    /// Surface model failures instead of substituting synthetic predictions.
    #[arg(long)]
    strict: bool,

    /// Skip model resolution and run on the fallback classifier.
    #[arg(long)]
    offline: bool,

    /// Directory holding bundled model files.
    #[arg(long)]
    models: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// How long to sample before exporting and exiting.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    duration_secs: u64,

    /// Directory for the JSON export.
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Do not write an export file at the end of the run.
    #[arg(long)]
    no_export: bool,

    /// Seed for the synthetic prediction generator.
    #[arg(long)]
    seed: Option<u64>,

    /// Persist period, policy, confidence and export dir as new defaults.
    #[arg(long)]
    save_settings: bool,
}

/// Settings and flags merged into the values one run uses.
struct RunOptions {
    period: Duration,
    policy: FallbackPolicy,
    confidence: f64,
    export_dir: PathBuf,
}

impl RunOptions {
    fn resolve(cli: &Cli, settings: &Settings) -> Self {
        Self {
            period: Duration::from_millis(cli.period_ms.unwrap_or(settings.period_ms)),
            policy: if cli.strict {
                FallbackPolicy::Strict
            } else {
                settings.policy
            },
            confidence: cli.confidence.unwrap_or(settings.face_confidence),
            export_dir: cli
                .export_dir
                .clone()
                .unwrap_or_else(|| settings.export_dir_or_cwd()),
        }
    }

    /// Settings files bypass flag validation, so the merged values are
    /// checked again.
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.period.is_zero() {
            return Err("Period must be at least 1 ms".into());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            )
            .into());
        }
        Ok(())
    }

    fn to_settings(&self) -> Settings {
        Settings {
            period_ms: self.period.as_millis() as u64,
            policy: self.policy,
            export_dir: Some(self.export_dir.clone()),
            face_confidence: self.confidence,
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let options = RunOptions::resolve(&cli, &Settings::load());
    options.validate()?;
    if cli.save_settings {
        options.to_settings().save();
        log::info!("Settings saved");
    }

    let source = build_source(&cli)?;
    let detector = build_detector(&cli, &options);
    let handle = threaded_sampler::spawn(
        source,
        detector,
        SamplerConfig {
            period: options.period,
            sampling_enabled: true,
        },
        Box::new(LogSamplingLogger::new()),
    );
    let updates = handle.subscribe();
    handle.start_camera();

    let outcome = watch(&updates, Duration::from_secs(cli.duration_secs));
    let last = handle.snapshot();
    handle.shutdown();

    let snapshot = match (outcome, last) {
        (Err(e), _) => return Err(e),
        (Ok(()), Some(snapshot)) => snapshot,
        (Ok(()), None) => return Err("sampler stopped unexpectedly".into()),
    };
    eprintln!("{}", dashboard::render(&snapshot));

    if !cli.no_export {
        let path = export::export_snapshot(&snapshot, &options.export_dir)?;
        println!("{}", path.display());
    }
    Ok(())
}

/// Renders snapshots until `duration` elapses. Stops early with an error
/// once sampling can never start.
fn watch(
    updates: &SnapshotSubscriber,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let deadline = Instant::now() + duration;
    let mut last_render: Option<Instant> = None;

    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        let snapshot = match updates.recv_timeout(left) {
            Ok(snapshot) => snapshot,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => break,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                return Err("sampler stopped unexpectedly".into());
            }
        };

        if let CameraStatus::Failed(reason) = &snapshot.camera {
            log::error!("{reason}");
            return Err(CAMERA_FAILURE_MESSAGE.into());
        }
        if let ModelStatus::Failed(reason) = &snapshot.model {
            return Err(format!("Model failed to load: {reason}").into());
        }

        if last_render.map_or(true, |t| t.elapsed() >= RENDER_INTERVAL) {
            eprintln!("{}", dashboard::render(&snapshot));
            last_render = Some(Instant::now());
        }
    }
    Ok(())
}

fn build_source(cli: &Cli) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    if let Some(frames) = &cli.frames {
        return Ok(Box::new(ImageSequenceSource::from_path(frames)));
    }
    webcam_source(cli)
}

#[cfg(feature = "webcam")]
fn webcam_source(cli: &Cli) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    use facemood_core::video::domain::video_source::CameraRequest;
    use facemood_core::video::infrastructure::webcam_source::WebcamSource;

    Ok(Box::new(WebcamSource::new(
        cli.camera,
        CameraRequest::default(),
    )))
}

#[cfg(not(feature = "webcam"))]
fn webcam_source(_cli: &Cli) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    Err("built without webcam support; pass --frames <image or directory>".into())
}

/// Resolves model files up front so downloads can report progress; any
/// failure is handed to the detector, whose policy decides what happens.
fn build_detector(cli: &Cli, options: &RunOptions) -> EmotionDetector {
    let loader: Box<dyn ModelLoader> = if cli.offline {
        Box::new(UnavailableModelLoader::new("offline mode"))
    } else {
        match resolve_models(cli.models.as_deref()) {
            Ok((face, expression)) => Box::new(
                OnnxModelLoader::new(cli.models.clone())
                    .with_model_paths(face, expression)
                    .with_confidence(options.confidence),
            ),
            Err(e) => Box::new(UnavailableModelLoader::new(e.to_string())),
        }
    };

    let detector = EmotionDetector::new(loader, options.policy);
    match cli.seed {
        Some(seed) => detector.with_synthetic(SyntheticPredictions::with_seed(seed)),
        None => detector,
    }
}

fn resolve_models(
    bundled: Option<&std::path::Path>,
) -> Result<(PathBuf, PathBuf), model_resolver::ModelResolveError> {
    log::info!("Resolving model: {}", FACE_MODEL.name);
    let face = model_resolver::resolve(FACE_MODEL, bundled, Some(Box::new(download_progress)))?;
    log::info!("Resolving model: {}", EXPRESSION_MODEL.name);
    let expression =
        model_resolver::resolve(EXPRESSION_MODEL, bundled, Some(Box::new(download_progress)))?;
    eprintln!();
    Ok((face, expression))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(frames) = &cli.frames {
        if !frames.exists() {
            return Err(format!("Frames not found: {}", frames.display()).into());
        }
    }
    if cli.period_ms == Some(0) {
        return Err("Period must be at least 1 ms".into());
    }
    if cli.duration_secs == 0 {
        return Err("Duration must be at least 1 second".into());
    }
    if let Some(c) = cli.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(format!("Confidence must be between 0.0 and 1.0, got {c}").into());
        }
    }
    if cli.frames.is_some() && cli.camera.is_some() {
        return Err("--frames and --camera are mutually exclusive".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
