//! Frequency-response visualization helpers
//!
//! Nothing here caches responses; a redraw always queries the chain afresh.

use serde::Serialize;

/// `count` frequencies spaced evenly on a log axis from `min_hz` to `max_hz`
pub fn log_spaced_frequencies(count: usize, min_hz: f32, max_hz: f32) -> Vec<f32> {
    match count {
        0 => Vec::new(),
        1 => vec![min_hz],
        _ => {
            let lo = (min_hz.max(f32::MIN_POSITIVE) as f64).ln();
            let hi = (max_hz.max(f32::MIN_POSITIVE) as f64).ln();
            let step = (hi - lo) / (count - 1) as f64;
            (0..count)
                .map(|i| (lo + step * i as f64).exp() as f32)
                .collect()
        }
    }
}

/// One point of a computed response, for JSON output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResponsePoint {
    pub frequency_hz: f32,
    pub magnitude_db: f32,
}

/// Zip query frequencies with their dB values
pub fn response_points(frequencies_hz: &[f32], magnitudes_db: &[f32]) -> Vec<ResponsePoint> {
    frequencies_hz
        .iter()
        .zip(magnitudes_db)
        .map(|(&frequency_hz, &magnitude_db)| ResponsePoint {
            frequency_hz,
            magnitude_db,
        })
        .collect()
}

/// Maps decibel values onto a fixed number of text rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponsePlot {
    pub mag_min_db: f32,
    pub mag_max_db: f32,
    pub height: usize,
}

impl Default for ResponsePlot {
    fn default() -> Self {
        Self {
            mag_min_db: -40.0,
            mag_max_db: 40.0,
            height: 16,
        }
    }
}

impl ResponsePlot {
    /// Row for a value, 0 at the top; out-of-range values are clamped
    ///
    /// Returns `None` for NaN.
    pub fn row_for(&self, db: f32) -> Option<usize> {
        if db.is_nan() || self.height == 0 {
            return None;
        }
        let span = self.mag_max_db - self.mag_min_db;
        if span <= 0.0 {
            return Some(0);
        }
        let normalized = ((self.mag_max_db - db) / span).clamp(0.0, 1.0);
        Some((normalized * (self.height - 1) as f32).round() as usize)
    }

    /// Draw one column per value with a dB axis on the left
    pub fn render(&self, magnitudes_db: &[f32]) -> String {
        let rows: Vec<Option<usize>> = magnitudes_db.iter().map(|&db| self.row_for(db)).collect();
        let zero_row = self.row_for(0.0);
        let mut out = String::new();

        for row in 0..self.height {
            let label = if row == 0 {
                format!("{:>6.1} |", self.mag_max_db)
            } else if row + 1 == self.height {
                format!("{:>6.1} |", self.mag_min_db)
            } else if Some(row) == zero_row {
                format!("{:>6.1} |", 0.0)
            } else {
                "       |".to_string()
            };
            out.push_str(&label);

            for r in &rows {
                let cell = match r {
                    Some(r) if *r == row => '*',
                    _ if Some(row) == zero_row => '-',
                    _ => ' ',
                };
                out.push(cell);
            }
            out.push('\n');
        }
        out
    }
}

/// Coalesces redraw requests to at most one redraw per interval
#[derive(Debug, Clone, PartialEq)]
pub struct RedrawTimer {
    interval_secs: f64,
    pending: bool,
    last_fired: Option<f64>,
}

impl RedrawTimer {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval_secs: interval_secs.max(0.0),
            pending: false,
            last_fired: None,
        }
    }

    /// Mark a redraw as needed (e.g. after a parameter change)
    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether a redraw should happen now; clears the pending flag if so
    pub fn poll(&mut self, now: f64) -> bool {
        if !self.pending {
            return false;
        }
        let due = self
            .last_fired
            .map_or(true, |last| now - last >= self.interval_secs);
        if due {
            self.pending = false;
            self.last_fired = Some(now);
        }
        due
    }
}
