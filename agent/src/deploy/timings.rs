//! Per-stage timing capture

use std::time::{Duration, Instant};

use tracing::info;

/// Records how long each pipeline stage took
#[derive(Debug)]
pub struct StageTimer {
    started: Instant,
    stage_started: Instant,
    stages: Vec<(&'static str, Duration)>,
}

impl StageTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            stage_started: now,
            stages: Vec::new(),
        }
    }

    /// Close the running stage under `name` and start the next one
    pub fn record(&mut self, name: &'static str) {
        let now = Instant::now();
        self.stages.push((name, now - self.stage_started));
        self.stage_started = now;
    }

    pub fn stages(&self) -> &[(&'static str, Duration)] {
        &self.stages
    }

    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }

    /// Render as `stage=12ms` pairs
    pub fn summary(&self) -> String {
        self.stages
            .iter()
            .map(|(name, d)| format!("{}={}ms", name, d.as_millis()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Emit one aggregated record for the job
    pub fn flush(&self, job: &str) {
        info!(
            job = %job,
            total_ms = self.total().as_millis() as u64,
            stages = %self.summary(),
            "Deploy timings"
        );
    }
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::start()
    }
}
