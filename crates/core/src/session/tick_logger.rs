use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for capture-loop events.
///
/// Keeps timing and counters out of the scheduler so callers choose
/// whether a session is silent or reports statistics.
pub trait TickLogger: Send {
    /// A new session is starting; forget previous statistics.
    fn reset(&mut self) {}

    /// One tick completed.
    fn tick(&mut self, index: u64);

    /// How long a named stage took during the current tick.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A point-in-time value such as the number of faces found.
    fn metric(&mut self, name: &str, value: f64);

    /// End-of-session report. Default: no-op.
    fn summary(&self) {}
}

pub struct NullTickLogger;

impl TickLogger for NullTickLogger {
    fn tick(&mut self, _index: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageStats {
    pub count: u64,
    pub total: f64,
    pub max: f64,
}

impl StageStats {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates per-stage timings and metrics for a live session and logs
/// a heartbeat every `throttle_ticks` ticks.
///
/// Only running aggregates are kept, so memory stays flat however long
/// the camera runs.
pub struct StatsTickLogger {
    throttle_ticks: u64,
    timings: BTreeMap<String, StageStats>,
    metrics: BTreeMap<String, StageStats>,
    started: Instant,
    ticks: u64,
}

impl StatsTickLogger {
    pub fn new(throttle_ticks: u64) -> Self {
        Self {
            throttle_ticks: throttle_ticks.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn timing_stats(&self, stage: &str) -> Option<StageStats> {
        self.timings.get(stage).copied()
    }

    pub fn metric_stats(&self, name: &str) -> Option<StageStats> {
        self.metrics.get(name).copied()
    }

    /// Formatted report, or `None` before the first tick.
    pub fn summary_string(&self) -> Option<String> {
        if self.ticks == 0 {
            return None;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Capture summary ({} ticks, {elapsed:.1}s):",
            self.ticks
        )];
        for (stage, stats) in &self.timings {
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:6.1}ms",
                stats.average(),
                stats.max
            ));
        }
        for (name, stats) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}", stats.average()));
        }
        if elapsed > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.ticks as f64 / elapsed
            ));
        }
        Some(lines.join("\n"))
    }
}

impl Default for StatsTickLogger {
    fn default() -> Self {
        Self::new(300)
    }
}

impl TickLogger for StatsTickLogger {
    fn reset(&mut self) {
        self.timings.clear();
        self.metrics.clear();
        self.ticks = 0;
        self.started = Instant::now();
    }

    fn tick(&mut self, index: u64) {
        self.ticks += 1;
        if self.ticks % self.throttle_ticks == 0 {
            let elapsed = self.started.elapsed().as_secs_f64();
            log::info!(
                "Captured {} frames (last #{index}, {:.1} fps)",
                self.ticks,
                if elapsed > 0.0 { self.ticks as f64 / elapsed } else { 0.0 }
            );
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
