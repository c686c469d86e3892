//! Shared downbeat timeline
//!
//! A fixed tempo plus one anchor time defines a grid of measure downbeats
//! that every group snaps its loop starts to.

use serde::{Deserialize, Serialize};

/// Default tempo in beats per minute
pub const DEFAULT_BPM: f64 = 120.0;

/// Default beats per measure
pub const DEFAULT_BEATS_PER_MEASURE: u32 = 4;

/// Default lead time between "now" and the earliest start, in seconds
pub const DEFAULT_BUFFER_TIME_SECS: f64 = 0.002;

/// Distance from a downbeat, in seconds, still treated as on the grid
pub const ON_GRID_TOLERANCE_SECS: f64 = 1e-6;

/// Fixed tempo and meter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoGrid {
    pub bpm: f64,
    pub beats_per_measure: u32,
}

impl Default for TempoGrid {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            beats_per_measure: DEFAULT_BEATS_PER_MEASURE,
        }
    }
}

impl TempoGrid {
    pub fn new(bpm: f64, beats_per_measure: u32) -> Self {
        Self {
            bpm,
            beats_per_measure,
        }
    }

    pub fn beat_duration(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn measure_duration(&self) -> f64 {
        self.beat_duration() * self.beats_per_measure as f64
    }
}

/// Process-wide phase state shared by all groups
///
/// `anchor_time` is `None` exactly when no group is active.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionTimeline {
    anchor_time: Option<f64>,
    active_group_count: usize,
}

impl SessionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_time(&self) -> Option<f64> {
        self.anchor_time
    }

    pub fn active_group_count(&self) -> usize {
        self.active_group_count
    }

    /// Snap `candidate` to the shared downbeat grid
    ///
    /// With no active group the candidate is returned as-is and becomes the
    /// next anchor. Otherwise it is rounded up to the next downbeat after the
    /// anchor, or, if the anchor itself is still pending, it reuses the
    /// anchor exactly. Candidates within [`ON_GRID_TOLERANCE_SECS`] of a
    /// downbeat count as already on it.
    pub fn align(&self, candidate: f64, measure_duration: f64) -> f64 {
        let anchor = match self.anchor_time {
            Some(anchor) if self.active_group_count > 0 => anchor,
            _ => return candidate,
        };

        let elapsed = candidate - anchor;
        if elapsed > 0.0 {
            let offset = elapsed % measure_duration;
            let remaining = measure_duration - offset;
            if offset > ON_GRID_TOLERANCE_SECS && remaining > ON_GRID_TOLERANCE_SECS {
                return candidate + remaining;
            }
            candidate
        } else {
            anchor
        }
    }

    /// Record a committed start; `newly_active` when a group left Idle
    pub(crate) fn commit_start(&mut self, start_time: f64, newly_active: bool) {
        self.anchor_time = Some(start_time);
        if newly_active {
            self.active_group_count += 1;
        }
    }

    /// Record a group going idle; clears the anchor when none remain
    pub(crate) fn commit_stop(&mut self) {
        self.active_group_count = self.active_group_count.saturating_sub(1);
        if self.active_group_count == 0 {
            self.anchor_time = None;
        }
    }
}
