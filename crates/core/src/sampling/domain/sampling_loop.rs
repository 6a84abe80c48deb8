use std::time::Duration;

use crate::emotion::domain::prediction::PredictionSet;
use crate::emotion::emotion_detector::DetectError;
use crate::sampling::domain::dashboard_snapshot::{CameraStatus, DashboardSnapshot, ModelStatus};
use crate::sampling::domain::sampling_state::{EmotionHistory, PerformanceMetrics, SystemStats};

/// Why a tick did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    CameraInactive,
    ModelNotReady,
    SamplingDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Grab a frame and hand it to the detector under this ticket.
    Start { ticket: u64 },
    /// A previous call is still outstanding; this tick is dropped.
    SkipInFlight,
    NotReady(NotReady),
}

/// What a completion did to the state.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied { faces: u32 },
    Failed(DetectError),
    /// The ticket does not match the outstanding call.
    Stale,
}

/// State machine behind the periodic sampler.
///
/// Holds everything the dashboard shows and enforces the single-slot rule:
/// at most one ticket is outstanding, and new ticks are skipped until it
/// completes or is abandoned. Time and threading live elsewhere.
#[derive(Debug, Default)]
pub struct SamplingLoop {
    predictions: PredictionSet,
    history: EmotionHistory,
    stats: SystemStats,
    metrics: PerformanceMetrics,
    camera: CameraStatus,
    model: ModelStatus,
    sampling_enabled: bool,
    in_flight: Option<u64>,
    next_ticket: u64,
    ticks_started: u64,
    ticks_skipped: u64,
    ticks_failed: u64,
}

impl SamplingLoop {
    pub fn new() -> Self {
        Self {
            sampling_enabled: true,
            ..Self::default()
        }
    }

    pub fn set_camera(&mut self, camera: CameraStatus) {
        self.camera = camera;
    }

    pub fn set_model(&mut self, model: ModelStatus) {
        self.model = model;
    }

    pub fn set_sampling_enabled(&mut self, enabled: bool) {
        self.sampling_enabled = enabled;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn on_tick(&mut self) -> TickDecision {
        if !self.camera.is_active() {
            return TickDecision::NotReady(NotReady::CameraInactive);
        }
        if !self.model.is_ready() {
            return TickDecision::NotReady(NotReady::ModelNotReady);
        }
        if !self.sampling_enabled {
            return TickDecision::NotReady(NotReady::SamplingDisabled);
        }
        if self.in_flight.is_some() {
            self.ticks_skipped += 1;
            return TickDecision::SkipInFlight;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        self.ticks_started += 1;
        self.stats.is_processing = true;
        TickDecision::Start { ticket }
    }

    /// Applies the result of the call issued under `ticket`.
    ///
    /// `elapsed` is the wall time of the detector call alone.
    pub fn on_complete(
        &mut self,
        ticket: u64,
        result: Result<PredictionSet, DetectError>,
        elapsed: Duration,
    ) -> Completion {
        if self.in_flight != Some(ticket) {
            return Completion::Stale;
        }
        self.in_flight = None;

        let predictions = match result {
            Ok(p) => p,
            Err(e) => {
                self.stats.is_processing = false;
                self.ticks_failed += 1;
                return Completion::Failed(e);
            }
        };

        let faces = u32::from(!predictions.is_empty());
        self.stats = SystemStats::completed(elapsed, faces);
        if let Some(top) = predictions.top() {
            self.history.record(top.emotion);
            self.metrics.total_predictions += 1;
        }
        self.predictions = predictions;
        Completion::Applied { faces }
    }

    /// Gives up on `ticket` without a result (e.g. the frame grab failed).
    pub fn abandon(&mut self, ticket: u64) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
            self.stats.is_processing = false;
            self.ticks_failed += 1;
        }
    }

    pub fn camera(&self) -> &CameraStatus {
        &self.camera
    }

    pub fn model(&self) -> &ModelStatus {
        &self.model
    }

    pub fn predictions(&self) -> &PredictionSet {
        &self.predictions
    }

    pub fn history(&self) -> &EmotionHistory {
        &self.history
    }

    pub fn stats(&self) -> &SystemStats {
        &self.stats
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            predictions: self.predictions.clone(),
            history: self.history.clone(),
            stats: self.stats,
            metrics: self.metrics.clone(),
            camera: self.camera.clone(),
            model: self.model.clone(),
            sampling_enabled: self.sampling_enabled,
            ticks_started: self.ticks_started,
            ticks_skipped: self.ticks_skipped,
            ticks_failed: self.ticks_failed,
        }
    }
}
