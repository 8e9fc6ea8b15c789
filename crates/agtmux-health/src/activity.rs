//! Per-pane output activity tracking.
//!
//! [`ActivityTracker`] remembers, for every pane it has seen, a hash of the
//! last captured text, when that text last changed, and how many non-empty
//! lines it had. Each [`ActivityTracker::observe`] call turns the new capture
//! into an [`ActivityDelta`]. Staleness and velocity for the stall check come
//! from these deltas.
//!
//! The tracker is an owned object. Callers hold one per process and pass it
//! by reference, and tests create isolated instances.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Cached state for one pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneActivitySample {
    #[serde(rename = "paneID")]
    pub pane_id: String,
    pub content_hash: String,
    pub last_change: DateTime<Utc>,
    pub non_empty_line_count: usize,
    pub last_sample: DateTime<Utc>,
}

/// Result of one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDelta {
    /// Lines of new output attributed to this sample. Never 0 on the first
    /// sample or when the content changed.
    pub delta_lines: usize,
    pub changed: bool,
    pub first_sample: bool,
    pub last_change: DateTime<Utc>,
    /// `delta_lines` per second since the previous sample.
    pub velocity: f64,
}

#[derive(Debug, Default)]
pub struct ActivityTracker {
    panes: RwLock<HashMap<String, PaneActivitySample>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest captured text for `pane_id`.
    pub fn observe(&self, pane_id: &str, text: &str, now: DateTime<Utc>) -> ActivityDelta {
        let hash = content_hash(text);
        let lines = non_empty_lines(text);

        // Hash and count are computed before taking the write lock so the
        // exclusive section is a single map update.
        let mut panes = self.panes.write().unwrap_or_else(PoisonError::into_inner);

        let Some(prev) = panes.get_mut(pane_id) else {
            panes.insert(
                pane_id.to_string(),
                PaneActivitySample {
                    pane_id: pane_id.to_string(),
                    content_hash: hash,
                    last_change: now,
                    non_empty_line_count: lines,
                    last_sample: now,
                },
            );
            return ActivityDelta {
                delta_lines: lines,
                changed: true,
                first_sample: true,
                last_change: now,
                velocity: lines as f64,
            };
        };

        let changed = prev.content_hash != hash;
        let delta_lines = if lines < prev.non_empty_line_count {
            // Buffer wrapped or was cleared.
            lines
        } else {
            let delta = lines - prev.non_empty_line_count;
            if delta == 0 && changed { 1 } else { delta }
        };

        let elapsed = (now - prev.last_sample).num_milliseconds().max(1000) as f64 / 1000.0;

        if changed {
            prev.content_hash = hash;
            prev.last_change = now;
        }
        prev.non_empty_line_count = lines;
        prev.last_sample = now;

        ActivityDelta {
            delta_lines,
            changed,
            first_sample: false,
            last_change: prev.last_change,
            velocity: delta_lines as f64 / elapsed,
        }
    }

    pub fn get(&self, pane_id: &str) -> Option<PaneActivitySample> {
        self.panes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pane_id)
            .cloned()
    }

    /// Seconds since the pane's content last changed.
    pub fn idle_seconds(&self, pane_id: &str, now: DateTime<Utc>) -> Option<i64> {
        self.get(pane_id)
            .map(|s| (now - s.last_change).num_seconds().max(0))
    }

    pub fn len(&self) -> usize {
        self.panes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hex SHA-256 of the captured text.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn non_empty_lines(text: &str) -> usize {
    text.lines().filter(|l| !l.trim().is_empty()).count()
}
