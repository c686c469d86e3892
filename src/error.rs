//! Error handling for Beatmix
//!
//! Failures are split into fatal startup errors (no audio engine) and
//! per-track errors that only disable a single control.

use thiserror::Error;

/// Result type alias for Beatmix operations
pub type Result<T> = std::result::Result<T, MixerError>;

/// Main error type for Beatmix operations
#[derive(Error, Debug)]
pub enum MixerError {
    // Engine Errors
    #[error("Audio engine unsupported: {reason}")]
    AudioUnsupported { reason: String },

    // Signal Chain Errors
    #[error("Equalizer needs at least 2 bands, got {band_count}")]
    InvalidBandCount { band_count: usize },

    #[error("Equalizer band {index} out of range (chain has {band_count} bands)")]
    BandOutOfRange { index: usize, band_count: usize },

    // Scheduler / Session Errors
    #[error("Unknown group: {group}")]
    UnknownGroup { group: String },

    #[error("Unknown control: {control}")]
    UnknownControl { control: String },

    #[error("Control '{control}' is not usable: {reason}")]
    ControlUnavailable { control: String, reason: String },

    // Asset Errors
    #[error("Asset not found: {url}")]
    AssetNotFound {
        url: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Asset load task failed: {reason}")]
    LoadTaskFailed { reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MixerError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixerError::AudioUnsupported { .. } => "AUDIO_UNSUPPORTED",
            MixerError::InvalidBandCount { .. } => "INVALID_BAND_COUNT",
            MixerError::BandOutOfRange { .. } => "BAND_OUT_OF_RANGE",
            MixerError::UnknownGroup { .. } => "UNKNOWN_GROUP",
            MixerError::UnknownControl { .. } => "UNKNOWN_CONTROL",
            MixerError::ControlUnavailable { .. } => "CONTROL_UNAVAILABLE",
            MixerError::AssetNotFound { .. } => "ASSET_NOT_FOUND",
            MixerError::InvalidAudio { .. } => "INVALID_AUDIO",
            MixerError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            MixerError::LoadTaskFailed { .. } => "LOAD_TASK_FAILED",
            MixerError::InvalidConfig { .. } => "INVALID_CONFIG",
            MixerError::Io(_) => "IO_ERROR",
            MixerError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the session can keep running after this error
    ///
    /// Per-track failures only disable their own control. Engine and
    /// configuration failures stop the session before it starts.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MixerError::AudioUnsupported { .. } => false,
            MixerError::InvalidBandCount { .. } => false,
            MixerError::InvalidConfig { .. } => false,
            MixerError::Io(_) => false,
            MixerError::Serialization(_) => false,
            _ => true,
        }
    }

    /// Check if this error comes from loading or decoding a track's asset
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            MixerError::AssetNotFound { .. }
                | MixerError::InvalidAudio { .. }
                | MixerError::UnsupportedFormat { .. }
                | MixerError::LoadTaskFailed { .. }
        )
    }
}
