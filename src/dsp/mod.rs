//! Equalizer DSP
//!
//! Biquad design, the tagged equalizer band type, and the master signal
//! chain that every playing loop is mixed into.

mod biquad;
mod chain;
mod eq;

pub use biquad::{BiquadCoeffs, BiquadState};
pub use chain::{
    SignalChain, DEFAULT_BAND_COUNT, DEFAULT_MARGIN_HZ, MAX_MASTER_GAIN, MIN_MASTER_GAIN,
};
pub use eq::{
    BandUpdate, DecibelScale, EqualizerBand, FilterKind, DEFAULT_Q, MAX_BAND_GAIN_DB, MAX_Q,
    MIN_BAND_GAIN_DB, MIN_Q,
};
