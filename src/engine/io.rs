//! WAV decoding and encoding
//!
//! Decoded assets are resampled to the engine rate so every voice plays
//! at its native pitch.

use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{MixerError, Result};

/// Output format for rendered mixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth (16, 24, or 32-bit float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self { bit_depth: 16 }
    }
}

impl ExportFormat {
    pub fn new(bit_depth: u16) -> Self {
        Self { bit_depth }
    }

    /// 32-bit float, lossless for the internal format
    pub fn float() -> Self {
        Self { bit_depth: 32 }
    }
}

fn wav_error(e: hound::Error) -> MixerError {
    match e {
        hound::Error::IoError(io) => MixerError::Io(io),
        other => MixerError::InvalidAudio {
            reason: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}

/// Decode WAV data from any reader
///
/// # Errors
/// * `InvalidAudio` - not a WAV stream, or corrupt sample data
/// * `UnsupportedFormat` - more than two channels or an odd bit depth
pub fn decode_wav<R: Read>(source: R, target_sample_rate: u32) -> Result<AudioBuffer> {
    let reader = WavReader::new(source).map_err(|e| MixerError::InvalidAudio {
        reason: format!("Failed to parse WAV header: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if ChannelLayout::from_count(channels).is_none() {
        return Err(MixerError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let channel_data = deinterleave(&interleaved, channels);

    let channel_data = if spec.sample_rate != target_sample_rate {
        resample_channels(&channel_data, spec.sample_rate, target_sample_rate)
    } else {
        channel_data
    };

    let buffer = AudioBuffer::from_channels(channel_data, target_sample_rate)?;
    if buffer.is_empty() {
        return Err(MixerError::InvalidAudio {
            reason: "Audio contains no samples".to_string(),
            source: None,
        });
    }
    Ok(buffer)
}

/// Decode a WAV file from disk
pub fn import_wav(path: &Path, target_sample_rate: u32) -> Result<AudioBuffer> {
    let file = std::fs::File::open(path).map_err(|e| MixerError::AssetNotFound {
        url: path.display().to_string(),
        source: Some(e),
    })?;
    decode_wav(std::io::BufReader::new(file), target_sample_rate)
}

/// Write a buffer to a WAV file
pub fn export_wav(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    if !matches!(format.bit_depth, 16 | 24 | 32) {
        return Err(MixerError::UnsupportedFormat {
            format: format!("{}-bit audio (only 16, 24, 32 supported)", format.bit_depth),
        });
    }

    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let interleaved = buffer.to_interleaved();
    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;

    match format.bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(wav_error)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(wav_error)?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(wav_error)?;
            }
        }
    }

    writer.finalize().map_err(wav_error)
}

/// Generate a mono sine tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::new(num_samples, ChannelLayout::Mono, sample_rate);
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    for (i, sample) in buffer.channel_mut(0).iter_mut().enumerate() {
        *sample = (angular_freq * i as f32).sin();
    }

    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let samples: std::result::Result<Vec<f32>, hound::Error> = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader.samples::<f32>().collect(),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect(),
        (SampleFormat::Int, bits) => {
            return Err(MixerError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            })
        }
    };

    samples.map_err(|e| MixerError::InvalidAudio {
        reason: format!("Failed to decode samples: {}", e),
        source: Some(Box::new(e)),
    })
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            result[ch].push(sample);
        }
    }
    result
}

fn resample_channels(channels: &[Vec<f32>], source_rate: u32, target_rate: u32) -> Vec<Vec<f32>> {
    let ratio = target_rate as f64 / source_rate as f64;
    channels
        .iter()
        .map(|channel| resample_linear(channel, ratio))
        .collect()
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).round() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================
