//! Timing recorder for init/calc phases
//!
//! An append-only, timestamped event log keyed by string labels. Interval
//! statistics pair the i-th occurrence of a start label with the i-th
//! occurrence of its end label, in insertion order, so unrelated labels
//! logged in between do not disturb the pairing.
//!
//! ## Example
//!
//! ```
//! use pacbench::timing::TimingRecorder;
//!
//! let recorder = TimingRecorder::new();
//! recorder.record("calc_start");
//! recorder.record("calc_end");
//! let stat = recorder.interval_stats("calc_start", "calc_end").unwrap();
//! assert_eq!(stat.count, 1);
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Label recorded when model initialisation starts
pub const INIT_START: &str = "init_start";
/// Label recorded when model initialisation ends
pub const INIT_END: &str = "init_end";
/// Label recorded before each backend run
pub const CALC_START: &str = "calc_start";
/// Label recorded after each successful backend run
pub const CALC_END: &str = "calc_end";
/// Label recorded instead of [`CALC_END`] when a run fails
pub const CALC_FAILED: &str = "calc_failed";

/// A single labelled timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEvent {
    /// Event label
    pub label: String,
    /// Seconds since the recorder was created
    pub timestamp: f64,
}

/// Aggregated duration between paired events
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntervalStat {
    /// Mean interval in seconds
    pub mean_seconds: f64,
    /// Population standard deviation in seconds
    pub std_seconds: f64,
    /// Number of pairs
    pub count: usize,
}

impl IntervalStat {
    /// Summarise a set of durations
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn from_durations(durations: &[f64]) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = durations.len() as f64;
        let mean = durations.iter().sum::<f64>() / n;
        let variance = durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean_seconds: mean,
            std_seconds: variance.sqrt(),
            count: durations.len(),
        })
    }
}

/// Append-only labelled event log
///
/// Cloning a recorder yields a handle to the same log, so several
/// components can share one timeline. Appends are serialised through a
/// mutex.
#[derive(Debug, Clone)]
pub struct TimingRecorder {
    origin: Instant,
    events: Arc<Mutex<Vec<TimingEvent>>>,
}

impl TimingRecorder {
    /// Create an empty recorder; timestamps are measured from now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append `(label, now)`
    ///
    /// The clock is read while holding the lock, so timestamps never
    /// decrease in arrival order even with concurrent writers.
    pub fn record(&self, label: &str) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push(TimingEvent {
            label: label.to_string(),
            timestamp: self.origin.elapsed().as_secs_f64(),
        });
    }

    #[cfg(test)]
    fn push_at(&self, label: &str, timestamp: f64) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push(TimingEvent {
            label: label.to_string(),
            timestamp,
        });
    }

    /// Snapshot of every event in arrival order
    #[must_use]
    pub fn events(&self) -> Vec<TimingEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Total number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamps of every occurrence of `label`, in arrival order
    #[must_use]
    pub fn timestamps(&self, label: &str) -> Vec<f64> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.label == label)
            .map(|e| e.timestamp)
            .collect()
    }

    /// Number of occurrences of `label`
    #[must_use]
    pub fn count(&self, label: &str) -> usize {
        self.timestamps(label).len()
    }

    /// Mean/std/count of `end - start` over matched label pairs
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Stats`] if either label never occurred or the
    /// two labels occurred a different number of times
    pub fn interval_stats(&self, start_label: &str, end_label: &str) -> Result<IntervalStat> {
        let starts = self.timestamps(start_label);
        let ends = self.timestamps(end_label);

        if starts.is_empty() || ends.is_empty() {
            return Err(BenchError::Stats {
                reason: format!(
                    "no events for '{}'",
                    if starts.is_empty() { start_label } else { end_label }
                ),
            });
        }
        if starts.len() != ends.len() {
            return Err(BenchError::Stats {
                reason: format!(
                    "'{}' occurred {} times but '{}' occurred {} times",
                    start_label,
                    starts.len(),
                    end_label,
                    ends.len()
                ),
            });
        }

        let durations: Vec<f64> = starts.iter().zip(&ends).map(|(s, e)| e - s).collect();
        IntervalStat::from_durations(&durations).ok_or_else(|| BenchError::Stats {
            reason: "no interval pairs".to_string(),
        })
    }
}

impl Default for TimingRecorder {
    fn default() -> Self {
        Self::new()
    }
}
