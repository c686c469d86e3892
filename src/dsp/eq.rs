//! Graphic equalizer bands
//!
//! Each band is a biquad whose shape is a tagged `FilterKind`. The kind
//! carries the coefficient design, so a band array stays homogeneous while
//! every entry knows how to compute its own response.

use super::biquad::BiquadCoeffs;
use crate::engine::AudioParam;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

// ============================================================================
// Parameter ranges
// ============================================================================

/// Default band Q
pub const DEFAULT_Q: f32 = 1.0;

/// Smallest Q the engine accepts
pub const MIN_Q: f32 = 0.0001;

/// Largest Q the engine accepts
pub const MAX_Q: f32 = 1000.0;

/// Band gain range in dB
pub const MIN_BAND_GAIN_DB: f32 = -40.0;
pub const MAX_BAND_GAIN_DB: f32 = 40.0;

// ============================================================================
// Filter kind
// ============================================================================

/// Filter shape of an equalizer band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Boost/cut below the corner frequency
    LowShelf,
    /// Bell curve boost/cut around the center frequency
    Peaking,
    /// Boost/cut above the corner frequency
    HighShelf,
}

impl FilterKind {
    /// Kind for band `index` of a `band_count`-band equalizer
    ///
    /// The lowest band is a low shelf, the highest a high shelf, and
    /// everything between is peaking.
    pub fn for_band(index: usize, band_count: usize) -> Self {
        if index == 0 {
            FilterKind::LowShelf
        } else if index + 1 == band_count {
            FilterKind::HighShelf
        } else {
            FilterKind::Peaking
        }
    }

    /// Whether Q has any effect on this shape
    ///
    /// Shelves use a fixed slope of 1, matching browser audio engines.
    pub fn uses_q(self) -> bool {
        matches!(self, FilterKind::Peaking)
    }

    /// Design biquad coefficients (Audio EQ Cookbook)
    pub fn coefficients(self, sample_rate: f64, frequency: f64, q: f64, gain_db: f64) -> BiquadCoeffs {
        let nyquist = sample_rate / 2.0;
        let freq = frequency.clamp(1.0, nyquist - 1.0);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();

        match self {
            FilterKind::Peaking => {
                if q <= 0.0 {
                    // Zero bandwidth degenerates to a flat gain of A^2
                    return BiquadCoeffs::gain(a * a);
                }
                let alpha = sin_w0 / (2.0 * q);
                BiquadCoeffs::normalized(
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            FilterKind::LowShelf => {
                let alpha = sin_w0 / 2.0 * SQRT_2;
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                BiquadCoeffs::normalized(
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterKind::HighShelf => {
                let alpha = sin_w0 / 2.0 * SQRT_2;
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                BiquadCoeffs::normalized(
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        }
    }
}

// ============================================================================
// Decibel scale
// ============================================================================

/// How linear magnitudes are turned into the dB values of a response curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecibelScale {
    /// Standard amplitude decibels: 20 * log10(x)
    #[default]
    Log10,
    /// Legacy curve calibration: 20 * ln(x), about 2.3x larger than standard
    NaturalLog,
}

impl DecibelScale {
    #[inline]
    pub fn to_db(self, magnitude: f64) -> f64 {
        match self {
            DecibelScale::Log10 => 20.0 * magnitude.log10(),
            DecibelScale::NaturalLog => 20.0 * magnitude.ln(),
        }
    }
}

// ============================================================================
// Equalizer band
// ============================================================================

/// Partial update for a band's mutable parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandUpdate {
    #[serde(default)]
    pub q: Option<f32>,
    #[serde(default)]
    pub gain_db: Option<f32>,
}

impl BandUpdate {
    pub fn gain(gain_db: f32) -> Self {
        Self {
            q: None,
            gain_db: Some(gain_db),
        }
    }

    pub fn q(q: f32) -> Self {
        Self {
            q: Some(q),
            gain_db: None,
        }
    }
}

/// One band of the graphic equalizer
///
/// The center frequency and kind are fixed at construction; Q and gain are
/// live parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EqualizerBand {
    index: usize,
    center_frequency_hz: f32,
    kind: FilterKind,
    q: AudioParam,
    gain_db: AudioParam,
}

impl EqualizerBand {
    pub fn new(index: usize, center_frequency_hz: f32, kind: FilterKind) -> Self {
        Self {
            index,
            center_frequency_hz,
            kind,
            q: AudioParam::new(DEFAULT_Q, MIN_Q, MAX_Q),
            gain_db: AudioParam::new(0.0, MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn center_frequency_hz(&self) -> f32 {
        self.center_frequency_hz
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn q(&self) -> &AudioParam {
        &self.q
    }

    pub fn q_mut(&mut self) -> &mut AudioParam {
        &mut self.q
    }

    pub fn gain_db(&self) -> &AudioParam {
        &self.gain_db
    }

    pub fn gain_db_mut(&mut self) -> &mut AudioParam {
        &mut self.gain_db
    }

    /// Apply whichever fields of `update` are set
    pub fn apply(&mut self, update: BandUpdate) {
        if let Some(q) = update.q {
            self.q.set_value(q);
        }
        if let Some(gain_db) = update.gain_db {
            self.gain_db.set_value(gain_db);
        }
    }

    /// Coefficients for the band's current parameters
    pub fn coefficients(&self, sample_rate: f64) -> BiquadCoeffs {
        self.kind.coefficients(
            sample_rate,
            self.center_frequency_hz as f64,
            self.q.value() as f64,
            self.gain_db.value() as f64,
        )
    }

    /// Linear magnitude response at each requested frequency
    pub fn magnitude_response(&self, frequencies_hz: &[f32], sample_rate: f64) -> Vec<f64> {
        let coeffs = self.coefficients(sample_rate);
        frequencies_hz
            .iter()
            .map(|&f| coeffs.magnitude_at(f as f64, sample_rate))
            .collect()
    }
}
