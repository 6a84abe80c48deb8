use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::emotion::domain::prediction::PredictionSet;
use crate::emotion::emotion_detector::{DetectError, EmotionDetector};
use crate::sampling::domain::dashboard_snapshot::{CameraStatus, DashboardSnapshot, ModelStatus};
use crate::sampling::domain::sampling_loop::{Completion, SamplingLoop, TickDecision};
use crate::sampling::infrastructure::snapshot_feed::{
    snapshot_feed, SnapshotPublisher, SnapshotSubscriber,
};
use crate::sampling::sampling_logger::SamplingLogger;
use crate::shared::constants::SAMPLING_PERIOD_MS;
use crate::shared::frame::Frame;
use crate::video::domain::video_source::VideoSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Fixed interval between tick starts.
    pub period: Duration,
    /// Whether ticks fire as soon as camera and model are ready.
    pub sampling_enabled: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(SAMPLING_PERIOD_MS),
            sampling_enabled: true,
        }
    }
}

enum Command {
    StartCamera,
    StopCamera,
    SetSampling(bool),
    Subscribe(SnapshotPublisher),
    Snapshot(Sender<DashboardSnapshot>),
    Shutdown,
}

struct DetectRequest {
    ticket: u64,
    frame: Frame,
}

enum WorkerEvent {
    Loaded(Result<String, DetectError>),
    Completed {
        ticket: u64,
        result: Result<PredictionSet, DetectError>,
        elapsed: Duration,
    },
}

/// Owner-side handle of a running sampler.
///
/// Layout: `loop [ticker, commands, state] -> worker [detector]`.
///
/// The loop thread owns the video source and all dashboard state; the worker
/// thread owns the detector, loads its model once and then serves one detect
/// request at a time. Dropping the handle stops the ticker, releases the
/// camera and joins both threads.
pub struct SamplerHandle {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

/// Starts the sampler threads. The camera stays off until
/// [`SamplerHandle::start_camera`].
pub fn spawn(
    source: Box<dyn VideoSource>,
    detector: EmotionDetector,
    config: SamplerConfig,
    logger: Box<dyn SamplingLogger>,
) -> SamplerHandle {
    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    // Capacity one: the single outstanding detect call.
    let (request_tx, request_rx) = crossbeam_channel::bounded::<DetectRequest>(1);
    let (event_tx, event_rx) = crossbeam_channel::unbounded();

    let worker = spawn_worker(detector, request_rx, event_tx);
    let thread = std::thread::spawn(move || {
        let mut sampler = LoopThread::new(source, logger, config, request_tx);
        sampler.run(command_rx, event_rx);
        sampler.finish(worker);
    });

    SamplerHandle {
        commands: command_tx,
        thread: Some(thread),
    }
}

impl SamplerHandle {
    pub fn start_camera(&self) {
        self.send(Command::StartCamera);
    }

    pub fn stop_camera(&self) {
        self.send(Command::StopCamera);
    }

    pub fn set_sampling(&self, enabled: bool) {
        self.send(Command::SetSampling(enabled));
    }

    /// Feed of the state after every change. A slow reader skips
    /// intermediate snapshots and always gets the newest one.
    pub fn subscribe(&self) -> SnapshotSubscriber {
        let (publisher, subscriber) = snapshot_feed();
        self.send(Command::Subscribe(publisher));
        subscriber
    }

    /// Current state, or `None` once the loop has exited.
    pub fn snapshot(&self) -> Option<DashboardSnapshot> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.send(Command::Snapshot(tx));
        rx.recv().ok()
    }

    /// Stops sampling, releases the camera and waits for both threads. An
    /// outstanding detect call is allowed to finish first.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::warn!("Sampler loop is no longer running");
        }
    }

    fn stop_and_join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(Command::Shutdown);
            if thread.join().is_err() {
                log::error!("Sampler loop thread panicked");
            }
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn spawn_worker(
    mut detector: EmotionDetector,
    requests: Receiver<DetectRequest>,
    events: Sender<WorkerEvent>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let loaded = detector
            .load()
            .map(|()| detector.model_name().unwrap_or("unknown").to_string());
        if events.send(WorkerEvent::Loaded(loaded)).is_err() {
            return;
        }

        for DetectRequest { ticket, frame } in requests {
            let started = Instant::now();
            let result = detector.detect(&frame);
            let elapsed = started.elapsed();
            let event = WorkerEvent::Completed {
                ticket,
                result,
                elapsed,
            };
            if events.send(event).is_err() {
                break;
            }
        }
    })
}

struct LoopThread {
    state: SamplingLoop,
    source: Box<dyn VideoSource>,
    logger: Box<dyn SamplingLogger>,
    period: Duration,
    ticker: Receiver<Instant>,
    requests: Option<Sender<DetectRequest>>,
    subscribers: Vec<SnapshotPublisher>,
}

impl LoopThread {
    fn new(
        source: Box<dyn VideoSource>,
        logger: Box<dyn SamplingLogger>,
        config: SamplerConfig,
        requests: Sender<DetectRequest>,
    ) -> Self {
        let mut state = SamplingLoop::new();
        state.set_sampling_enabled(config.sampling_enabled);
        Self {
            state,
            source,
            logger,
            period: config.period,
            ticker: crossbeam_channel::never(),
            requests: Some(requests),
            subscribers: Vec::new(),
        }
    }

    fn run(&mut self, commands: Receiver<Command>, mut events: Receiver<WorkerEvent>) {
        loop {
            // Local clones so the arms may swap the ticker or the event source.
            let ticker = self.ticker.clone();
            let worker_events = events.clone();
            crossbeam_channel::select! {
                recv(ticker) -> _ => self.on_tick(),
                recv(commands) -> command => match command {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(command) => self.on_command(command),
                },
                recv(worker_events) -> event => match event {
                    Ok(event) => self.on_event(event),
                    Err(_) => {
                        log::error!("Detection worker exited unexpectedly");
                        self.state.set_model(ModelStatus::Failed("worker exited".into()));
                        events = crossbeam_channel::never();
                        self.publish();
                    }
                },
            }
        }
    }

    fn finish(mut self, worker: JoinHandle<()>) {
        self.stop_camera();
        // Closing the request channel ends the worker's loop.
        self.requests = None;
        if worker.join().is_err() {
            log::error!("Detection worker panicked");
        }
        self.logger.summary();
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::StartCamera => self.start_camera(),
            Command::StopCamera => self.stop_camera(),
            Command::SetSampling(enabled) => {
                self.state.set_sampling_enabled(enabled);
                self.logger.info(if enabled {
                    "Sampling enabled"
                } else {
                    "Sampling paused"
                });
            }
            Command::Subscribe(publisher) => {
                if publisher.publish(self.state.snapshot()) {
                    self.subscribers.push(publisher);
                }
                return;
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.state.snapshot());
                return;
            }
            Command::Shutdown => return,
        }
        self.publish();
    }

    fn start_camera(&mut self) {
        match self.source.start() {
            Ok(()) => {
                self.state.set_camera(CameraStatus::Active);
                self.ticker = crossbeam_channel::tick(self.period);
                self.logger
                    .info(&format!("Camera started: {}", self.source.describe()));
            }
            Err(e) => {
                log::error!("Error accessing camera: {e}");
                self.state.set_camera(CameraStatus::Failed(e.to_string()));
                self.ticker = crossbeam_channel::never();
            }
        }
    }

    fn stop_camera(&mut self) {
        self.ticker = crossbeam_channel::never();
        if self.source.is_active() {
            self.source.stop();
            self.logger.info("Camera stopped");
        }
        if self.state.camera().is_active() {
            self.state.set_camera(CameraStatus::Inactive);
        }
    }

    fn on_tick(&mut self) {
        let ticket = match self.state.on_tick() {
            TickDecision::Start { ticket } => ticket,
            TickDecision::SkipInFlight => {
                self.logger.skipped();
                return;
            }
            TickDecision::NotReady(_) => return,
        };

        let grab_started = Instant::now();
        let frame = match self.source.current_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Error grabbing frame: {e}");
                self.state.abandon(ticket);
                self.publish();
                return;
            }
        };
        self.logger
            .timing("grab", grab_started.elapsed().as_secs_f64() * 1000.0);

        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.try_send(DetectRequest { ticket, frame }).is_ok());
        if !sent {
            log::warn!("Detection worker unavailable; tick abandoned");
            self.state.abandon(ticket);
        }
        self.publish();
    }

    fn on_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Loaded(Ok(name)) => {
                self.logger.info(&format!("Model ready: {name}"));
                self.state.set_model(ModelStatus::Ready(name));
            }
            WorkerEvent::Loaded(Err(e)) => {
                log::error!("Error loading models: {e}");
                self.state.set_model(ModelStatus::Failed(e.to_string()));
            }
            WorkerEvent::Completed {
                ticket,
                result,
                elapsed,
            } => {
                self.logger
                    .timing("detect", elapsed.as_secs_f64() * 1000.0);
                match self.state.on_complete(ticket, result, elapsed) {
                    Completion::Applied { faces } => {
                        self.logger.metric("fps", self.state.stats().fps);
                        self.logger.metric("faces", f64::from(faces));
                    }
                    Completion::Failed(e) => log::error!("Error during detection: {e}"),
                    Completion::Stale => return,
                }
            }
        }
        self.publish();
    }

    fn publish(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.state.snapshot();
        self.subscribers
            .retain(|publisher| publisher.publish(snapshot.clone()));
    }
}
