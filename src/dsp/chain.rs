//! Master signal chain
//!
//! Signal path: input -> master gain -> band[N-1] -> ... -> band[0] -> output.
//! Band centers partition `[10 + margin, round(sr / 2) - margin]` evenly.

use super::biquad::{BiquadCoeffs, BiquadState};
use super::eq::{BandUpdate, DecibelScale, EqualizerBand, FilterKind};
use crate::engine::{AudioBuffer, AudioParam};
use crate::error::{MixerError, Result};
use tracing::debug;

/// Default number of equalizer bands
pub const DEFAULT_BAND_COUNT: usize = 5;

/// Default distance kept between the band range and the spectrum edges
pub const DEFAULT_MARGIN_HZ: f32 = 1000.0;

/// Lowest frequency of the band range before the margin is applied
const BASE_FREQUENCY_HZ: f32 = 10.0;

/// Master gain range (linear)
pub const MIN_MASTER_GAIN: f32 = 0.0;
pub const MAX_MASTER_GAIN: f32 = 4.0;

/// Master gain stage followed by a cascade of equalizer bands
#[derive(Debug, Clone)]
pub struct SignalChain {
    sample_rate: f64,
    master_gain: AudioParam,
    bands: Vec<EqualizerBand>,
    decibel_scale: DecibelScale,
    /// Cached coefficients, one per band (index-aligned with `bands`)
    coeffs: Vec<BiquadCoeffs>,
    /// Filter history: [band][channel]
    states: Vec<Vec<BiquadState>>,
    coeffs_dirty: bool,
}

impl SignalChain {
    /// Build a chain with the default band count and margin
    pub fn new(sample_rate: u32) -> Result<Self> {
        Self::with_bands(sample_rate, DEFAULT_BAND_COUNT, DEFAULT_MARGIN_HZ)
    }

    /// Build a chain with `band_count` evenly spaced bands
    ///
    /// # Errors
    /// * `InvalidBandCount` - fewer than two bands (both shelves are required)
    /// * `InvalidConfig` - the sample rate leaves no room for distinct bands
    pub fn with_bands(sample_rate: u32, band_count: usize, margin_hz: f32) -> Result<Self> {
        if band_count < 2 {
            return Err(MixerError::InvalidBandCount { band_count });
        }

        let freq_min = BASE_FREQUENCY_HZ + margin_hz;
        let freq_max = (sample_rate as f32 * 0.5).round() - margin_hz;
        let freq_step = (freq_max - freq_min) / (band_count - 1) as f32;

        let bands: Vec<EqualizerBand> = (0..band_count)
            .map(|i| {
                let center = (freq_min + i as f32 * freq_step).round();
                EqualizerBand::new(i, center, FilterKind::for_band(i, band_count))
            })
            .collect();

        let increasing = bands
            .windows(2)
            .all(|pair| pair[0].center_frequency_hz() < pair[1].center_frequency_hz());
        if !increasing {
            return Err(MixerError::InvalidConfig {
                reason: format!(
                    "{} bands with a {} Hz margin do not fit below {} Hz",
                    band_count, margin_hz, freq_max + margin_hz
                ),
            });
        }

        debug!(
            sample_rate,
            band_count,
            freq_min,
            freq_max,
            "Built equalizer cascade"
        );

        Ok(Self {
            sample_rate: sample_rate as f64,
            master_gain: AudioParam::new(1.0, MIN_MASTER_GAIN, MAX_MASTER_GAIN),
            coeffs: vec![BiquadCoeffs::identity(); bands.len()],
            states: vec![Vec::new(); bands.len()],
            bands,
            decibel_scale: DecibelScale::default(),
            coeffs_dirty: true,
        })
    }

    /// Select the dB scale used by `frequency_response`
    pub fn with_decibel_scale(mut self, scale: DecibelScale) -> Self {
        self.decibel_scale = scale;
        self
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn decibel_scale(&self) -> DecibelScale {
        self.decibel_scale
    }

    pub fn set_decibel_scale(&mut self, scale: DecibelScale) {
        self.decibel_scale = scale;
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    pub fn master_gain(&self) -> &AudioParam {
        &self.master_gain
    }

    /// Set the master gain (linear amplitude)
    pub fn set_master_gain(&mut self, value: f32) {
        self.master_gain.set_value(value);
    }

    /// Bands in index order (index 0 is nearest the output)
    pub fn bands(&self) -> &[EqualizerBand] {
        &self.bands
    }

    pub fn band(&self, index: usize) -> Option<&EqualizerBand> {
        self.bands.get(index)
    }

    /// Mutable access to a band; marks the coefficient cache stale
    pub fn band_mut(&mut self, index: usize) -> Option<&mut EqualizerBand> {
        let band = self.bands.get_mut(index)?;
        self.coeffs_dirty = true;
        Some(band)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Update Q and/or gain of one band
    pub fn set_band_parameter(&mut self, index: usize, update: BandUpdate) -> Result<()> {
        let band_count = self.bands.len();
        let band = self
            .band_mut(index)
            .ok_or(MixerError::BandOutOfRange { index, band_count })?;
        band.apply(update);
        Ok(())
    }

    /// Return every band and the master gain to their defaults
    pub fn reset_parameters(&mut self) {
        self.master_gain.reset();
        for band in &mut self.bands {
            band.q_mut().reset();
            band.gain_db_mut().reset();
        }
        self.coeffs_dirty = true;
    }

    // ========================================================================
    // Response
    // ========================================================================

    /// Combined response of the cascade in dB at each requested frequency
    ///
    /// Bands are in series, so their per-band dB contributions add. The
    /// result is recomputed on every call.
    pub fn frequency_response(&self, frequencies_hz: &[f32]) -> Vec<f32> {
        let mut total = vec![0.0_f64; frequencies_hz.len()];
        for band in &self.bands {
            let magnitudes = band.magnitude_response(frequencies_hz, self.sample_rate);
            for (acc, magnitude) in total.iter_mut().zip(magnitudes) {
                *acc += self.decibel_scale.to_db(magnitude);
            }
        }
        total.into_iter().map(|db| db as f32).collect()
    }

    // ========================================================================
    // Processing
    // ========================================================================

    fn update_coefficients(&mut self, num_channels: usize) {
        for states in &mut self.states {
            if states.len() != num_channels {
                states.resize_with(num_channels, BiquadState::default);
            }
        }

        if !self.coeffs_dirty {
            return;
        }

        for (coeffs, band) in self.coeffs.iter_mut().zip(&self.bands) {
            *coeffs = band.coefficients(self.sample_rate);
        }
        self.coeffs_dirty = false;
    }

    /// Run a buffer through master gain and the band cascade in place
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        let num_channels = buffer.channels();
        self.update_coefficients(num_channels);

        let gain = self.master_gain.value() as f64;
        for channel in 0..num_channels {
            for sample in buffer.channel_mut(channel).iter_mut() {
                let mut value = *sample as f64 * gain;
                // Highest band sits closest to the input
                for band in (0..self.bands.len()).rev() {
                    value = self.states[band][channel].process(value, &self.coeffs[band]);
                }
                *sample = value as f32;
            }
        }
    }

    /// Clear all filter history
    pub fn reset(&mut self) {
        for states in &mut self.states {
            for state in states.iter_mut() {
                state.reset();
            }
        }
    }
}
