//! Mock audio engine for testing
//!
//! Records every start/stop request instead of producing audio, and lets
//! tests set the clock directly.

use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::context::{AudioEngine, VoiceId};

/// A scheduling request observed by the mock engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Start {
        voice: VoiceId,
        start_time: f64,
        looping: bool,
        frames: usize,
    },
    Stop {
        voice: VoiceId,
        stop_time: f64,
    },
}

/// Engine with a manual clock that records scheduling calls
#[derive(Debug, Clone)]
pub struct MockEngine {
    now: f64,
    sample_rate: u32,
    next_voice: u64,
    calls: Vec<EngineCall>,
}

impl MockEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            now: 0.0,
            sample_rate,
            next_voice: 0,
            calls: Vec::new(),
        }
    }

    /// Set the clock to an absolute time
    pub fn set_time(&mut self, now: f64) {
        self.now = now;
    }

    /// Move the clock forward
    pub fn advance(&mut self, secs: f64) {
        self.now += secs;
    }

    /// All calls in the order they were made
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Scheduled start time of a voice
    pub fn start_time_of(&self, voice: VoiceId) -> Option<f64> {
        self.calls.iter().find_map(|call| match call {
            EngineCall::Start {
                voice: v,
                start_time,
                ..
            } if *v == voice => Some(*start_time),
            _ => None,
        })
    }

    /// Most recent stop time scheduled for a voice
    pub fn stop_time_of(&self, voice: VoiceId) -> Option<f64> {
        self.calls.iter().rev().find_map(|call| match call {
            EngineCall::Stop { voice: v, stop_time } if *v == voice => Some(*stop_time),
            _ => None,
        })
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(48000)
    }
}

impl AudioEngine for MockEngine {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start_source(&mut self, buffer: Arc<AudioBuffer>, start_time: f64, looping: bool) -> VoiceId {
        let voice = VoiceId::new(self.next_voice);
        self.next_voice += 1;
        self.calls.push(EngineCall::Start {
            voice,
            start_time,
            looping,
            frames: buffer.len(),
        });
        voice
    }

    fn stop_source(&mut self, voice: VoiceId, stop_time: f64) {
        self.calls.push(EngineCall::Stop { voice, stop_time });
    }
}
