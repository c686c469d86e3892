//! Audio Buffer Management
//!
//! Decoded PCM as handed to playback voices and produced by the renderer.
//! Samples are non-interleaved 32-bit float, mono or stereo.

use crate::error::{MixerError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default engine sample rate (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio data
///
/// # Example
/// ```
/// use beatmix::engine::{AudioBuffer, ChannelLayout};
///
/// // One second of stereo silence at 48kHz
/// let buffer = AudioBuffer::new(48000, ChannelLayout::Stereo, 48000);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 48000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer with `num_samples` frames
    pub fn new(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// Fails if the channel count is not 1 or 2 or the channels differ in length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if ChannelLayout::from_count(samples.len()).is_none() {
            return Err(MixerError::UnsupportedFormat {
                format: format!("{}-channel audio (only mono/stereo supported)", samples.len()),
            });
        }
        let len = samples[0].len();
        if samples.iter().any(|ch| ch.len() != len) {
            return Err(MixerError::InvalidAudio {
                reason: "Channels have different lengths".to_string(),
                source: None,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for frame in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Sample for an output channel, up-mixing mono to every output channel
    #[inline]
    pub fn sample_for_output(&self, output_channel: usize, index: usize) -> f32 {
        let ch = output_channel.min(self.channels().saturating_sub(1));
        self.samples
            .get(ch)
            .and_then(|samples| samples.get(index).copied())
            .unwrap_or(0.0)
    }

    /// Peak absolute sample value over all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Peak absolute sample value within a frame range
    pub fn peak_in(&self, start: usize, end: usize) -> f32 {
        let end = end.min(self.len());
        if start >= end {
            return 0.0;
        }
        self.samples
            .iter()
            .flat_map(|channel| channel[start..end].iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Append another buffer with the same layout
    pub fn append(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            dst.extend_from_slice(src);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_channel_layout() {
        assert_eq!(ChannelLayout::Mono.num_channels(), 1);
        assert_eq!(ChannelLayout::from_count(2), Some(ChannelLayout::Stereo));
        assert_eq!(ChannelLayout::from_count(6), None);
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::new(24000, ChannelLayout::Mono, 48000);
        assert_relative_eq!(buffer.duration_secs(), 0.5);
    }

    #[test]
    fn test_buffer_to_interleaved_stereo() {
        let buffer = AudioBuffer::from_channels(vec![vec![1.0, 0.5], vec![-1.0, -0.5]], 48000).unwrap();
        assert_eq!(buffer.to_interleaved(), vec![1.0, -1.0, 0.5, -0.5]);
    }

    #[test]
    fn test_from_channels_rejects_mismatch() {
        assert!(AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 48000).is_err());
        assert!(AudioBuffer::from_channels(vec![vec![0.0; 4]; 3], 48000).is_err());
        assert!(AudioBuffer::from_channels(vec![vec![0.0; 4]], 48000).is_ok());
    }

    #[test]
    fn test_mono_upmix() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.25, 0.5]], 48000).unwrap();
        assert_eq!(buffer.sample_for_output(0, 1), 0.5);
        assert_eq!(buffer.sample_for_output(1, 1), 0.5);
        assert_eq!(buffer.sample_for_output(1, 9), 0.0);
    }

    #[test]
    fn test_peak_in_range() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.1, -0.9, 0.2, 0.3]], 48000).unwrap();
        assert_eq!(buffer.peak(), 0.9);
        assert_eq!(buffer.peak_in(2, 4), 0.3);
        assert_eq!(buffer.peak_in(3, 2), 0.0);
    }
}
