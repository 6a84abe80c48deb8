use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for sampler events.
///
/// Lets the binary, tests and any future front end observe tick behavior
/// without touching the loop itself.
pub trait SamplingLogger: Send {
    /// Record how long a named stage took for one tick.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. fps, detected faces).
    fn metric(&mut self, name: &str, value: f64);

    /// Count a tick that was skipped because a call was still outstanding.
    fn skipped(&mut self);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullSamplingLogger;

impl SamplingLogger for NullSamplingLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn skipped(&mut self) {}
    fn info(&mut self, _message: &str) {}
}

/// Count, sum and maximum of a stream of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStat {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
}

impl Default for RunningStat {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            max: f64::MIN,
        }
    }
}

impl RunningStat {
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregates per-stage timings and metrics and reports them through `log`.
///
/// Timings are logged at debug level as they arrive; `summary` prints the
/// averages at info level. Memory stays constant however long the run.
pub struct LogSamplingLogger {
    timings: HashMap<String, RunningStat>,
    metrics: HashMap<String, RunningStat>,
    skipped: u64,
    start_time: Instant,
}

impl LogSamplingLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            skipped: 0,
            start_time: Instant::now(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let ticks = self.timings.get("detect").map_or(0, |s| s.count);
        let mut lines = vec![format!(
            "Sampling summary ({ticks} ticks, {} skipped, {elapsed_s:.1}s total):",
            self.skipped
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stat) in stages {
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  max {:6.1}ms",
                stat.avg(),
                stat.max
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, stat) in names {
            lines.push(format!("  {name}: avg {:.1}", stat.avg()));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&RunningStat> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&RunningStat> {
        self.metrics.get(name)
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }
}

impl Default for LogSamplingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingLogger for LogSamplingLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        log::debug!("{stage}: {duration_ms:.1}ms");
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn skipped(&mut self) {
        self.skipped += 1;
        log::debug!("Tick skipped: detection still in flight");
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
