//! Progress tracking for long-running harvests.
//!
//! The record stream emits one [`FetchProgress`] per fetched record, which is far
//! too often to log. A [`ProgressReporter`] absorbs those events and writes a
//! progress line only when completion has advanced by a configurable percentage
//! step or when enough time has passed since the last line.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

use crate::fetcher::ProgressHook;
use crate::FetchProgress;

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_PERCENTAGE_STEP: f64 = 10.0;

/// Progress state for one harvest.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Records fetched so far
    pub completed: usize,
    /// Records expected in total
    pub total: usize,
    /// When the harvest started
    pub start_time: Instant,
    /// When progress was last reported
    pub last_update: Instant,
    /// Minimum interval between time-based updates
    pub update_interval: Duration,
    /// Percentage reached at the last report
    pub last_reported_percentage: f64,
    /// Percentage advance that forces a report
    pub min_percentage_step: f64,
}

impl ProgressState {
    /// Fresh state with default cadence.
    pub fn new(total: usize) -> Self {
        let now = Instant::now();
        Self {
            completed: 0,
            total,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            last_reported_percentage: 0.0,
            min_percentage_step: DEFAULT_PERCENTAGE_STEP,
        }
    }

    /// Absorb a progress snapshot.
    pub fn update(&mut self, progress: FetchProgress) {
        self.completed = progress.completed;
        self.total = progress.total;
    }

    /// Completion percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }

    /// Records per second since the start.
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.completed as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Whether a progress line is due.
    pub fn should_emit_update(&self) -> bool {
        if self.completed == 0 {
            return false;
        }
        if self.completed >= self.total {
            return true;
        }
        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }
        self.last_update.elapsed() >= self.update_interval
    }

    /// Reset timers and the cached percentage after a report.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Estimated time until completion.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let rate = self.rate();
        let remaining = self.total.saturating_sub(self.completed);
        if rate <= 0.0 || remaining == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }

    /// Human-readable progress line.
    pub fn format_progress(&self, label: &str) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Fetched {}/{} {} - {:.1}% complete",
            self.completed,
            self.total,
            label,
            self.percentage()
        )];

        let rate = self.rate();
        if rate > 0.0 {
            parts.push(format!("at {rate:.1} records/sec"));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Throttled progress logger that can be handed to the record stream.
#[derive(Debug)]
pub struct ProgressReporter {
    label: String,
    state: Mutex<ProgressState>,
}

impl ProgressReporter {
    /// Reporter for `total` records described as `label` (e.g. "objects").
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(ProgressState::new(total)),
        }
    }

    /// Override the reporting cadence.
    pub fn with_cadence(self, update_interval: Duration, min_percentage_step: f64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.update_interval = update_interval;
            state.min_percentage_step = min_percentage_step;
        }
        self
    }

    /// Absorb a snapshot, logging when a report is due. Returns whether it logged.
    pub fn record(&self, progress: FetchProgress) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        state.update(progress);
        if !state.should_emit_update() {
            return false;
        }
        info!(
            completed = state.completed,
            total = state.total,
            "{}",
            state.format_progress(&self.label)
        );
        state.mark_emitted();
        true
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Option<ProgressState> {
        self.state.lock().ok().map(|s| s.clone())
    }

    /// Adapt into a stream progress hook.
    pub fn into_hook(self: Arc<Self>) -> ProgressHook {
        Arc::new(move |progress: FetchProgress| {
            self.record(progress);
        })
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
