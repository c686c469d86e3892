//! Session configuration
//!
//! The track registry and every tunable constant live in one JSON file.
//! Scripted control events for offline rendering live in a second one.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dsp::{DecibelScale, DEFAULT_BAND_COUNT, DEFAULT_MARGIN_HZ};
use crate::engine::{AudioContext, DEFAULT_SAMPLE_RATE};
use crate::error::{MixerError, Result};
use crate::scheduler::{
    ControlId, GroupId, ReactivationPolicy, SchedulerSettings, TempoGrid,
    DEFAULT_BEATS_PER_MEASURE, DEFAULT_BPM, DEFAULT_BUFFER_TIME_SECS,
};

/// Tempo, meter and scheduling lead time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub bpm: f64,
    pub beats_per_measure: u32,
    pub buffer_time_secs: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            beats_per_measure: DEFAULT_BEATS_PER_MEASURE,
            buffer_time_secs: DEFAULT_BUFFER_TIME_SECS,
        }
    }
}

/// Graphic equalizer layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerConfig {
    pub band_count: usize,
    pub margin_hz: f32,
    pub decibel_scale: DecibelScale,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            band_count: DEFAULT_BAND_COUNT,
            margin_hz: DEFAULT_MARGIN_HZ,
            decibel_scale: DecibelScale::default(),
        }
    }
}

/// One registry entry: a control bound to a loop in a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub control: ControlId,
    pub group: GroupId,
    pub asset: String,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_asset_root() -> PathBuf {
    PathBuf::from(".")
}

/// Complete mixer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default)]
    pub equalizer: EqualizerConfig,
    #[serde(default)]
    pub reactivation: ReactivationPolicy,
    /// Directory relative asset URLs resolve against
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
    pub tracks: Vec<TrackEntry>,
}

impl MixerConfig {
    /// Config with default settings and the given registry
    pub fn with_tracks(tracks: Vec<TrackEntry>) -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            tempo: TempoConfig::default(),
            equalizer: EqualizerConfig::default(),
            reactivation: ReactivationPolicy::default(),
            asset_root: default_asset_root(),
            tracks,
        }
    }

    /// Read and validate a config file
    ///
    /// A relative `asset_root` is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut config: MixerConfig = serde_json::from_reader(BufReader::new(file))?;
        if config.asset_root.is_relative() {
            if let Some(dir) = path.parent() {
                config.asset_root = dir.join(&config.asset_root);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MixerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(invalid("track registry is empty"));
        }

        let mut seen = HashSet::new();
        for track in &self.tracks {
            if !seen.insert(&track.control) {
                return Err(invalid(format!("duplicate control id '{}'", track.control)));
            }
            if track.asset.trim().is_empty() {
                return Err(invalid(format!("control '{}' has no asset", track.control)));
            }
        }

        if !(self.tempo.bpm.is_finite() && self.tempo.bpm > 0.0) {
            return Err(invalid(format!("bpm must be positive, got {}", self.tempo.bpm)));
        }
        if self.tempo.beats_per_measure == 0 {
            return Err(invalid("beats_per_measure must be at least 1"));
        }
        if !(self.tempo.buffer_time_secs.is_finite() && self.tempo.buffer_time_secs >= 0.0) {
            return Err(invalid(format!(
                "buffer_time_secs must be non-negative, got {}",
                self.tempo.buffer_time_secs
            )));
        }
        if self.equalizer.band_count < 2 {
            return Err(MixerError::InvalidBandCount {
                band_count: self.equalizer.band_count,
            });
        }
        if !(self.equalizer.margin_hz.is_finite() && self.equalizer.margin_hz >= 0.0) {
            return Err(invalid("margin_hz must be non-negative"));
        }

        // Rate support is the engine's call, but catching it here gives a config error early
        AudioContext::check_sample_rate(self.sample_rate).map_err(|e| invalid(e.to_string()))
    }

    /// Groups in first-appearance order, without duplicates
    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut seen = HashSet::new();
        self.tracks
            .iter()
            .filter(|t| seen.insert(&t.group))
            .map(|t| t.group.clone())
            .collect()
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            grid: TempoGrid::new(self.tempo.bpm, self.tempo.beats_per_measure),
            buffer_time_secs: self.tempo.buffer_time_secs,
            reactivation: self.reactivation,
        }
    }
}

fn invalid(reason: impl Into<String>) -> MixerError {
    MixerError::InvalidConfig {
        reason: reason.into(),
    }
}

/// A control action replayed during offline rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    Toggle {
        control: ControlId,
        on: bool,
    },
    SetBand {
        band: usize,
        #[serde(default)]
        gain_db: Option<f32>,
        #[serde(default)]
        q: Option<f32>,
    },
    SetMasterGain {
        gain: f32,
    },
}

/// An action at an engine time in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEvent {
    pub at: f64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

/// Timed control events for `render`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionScript {
    pub events: Vec<ScriptEvent>,
}

impl SessionScript {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let script: SessionScript = serde_json::from_reader(BufReader::new(file))?;
        script.validate()?;
        Ok(script.sorted())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let script: SessionScript = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script.sorted())
    }

    fn validate(&self) -> Result<()> {
        match self.events.iter().find(|e| !(e.at.is_finite() && e.at >= 0.0)) {
            Some(event) => Err(invalid(format!("script event time {} is invalid", event.at))),
            None => Ok(()),
        }
    }

    /// Events ordered by time; ties keep file order
    fn sorted(mut self) -> Self {
        self.events.sort_by(|a, b| a.at.total_cmp(&b.at));
        self
    }

    /// Time of the last event
    pub fn last_event_time(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"{
        "tracks": [
            { "control": "drums-1", "group": "drums", "asset": "drums1.wav" },
            { "control": "drums-2", "group": "drums", "asset": "drums2.wav" },
            { "control": "bass-1", "group": "bass", "asset": "bass1.wav" }
        ]
    }"#;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = MixerConfig::from_json_str(MINIMAL).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.tempo, TempoConfig::default());
        assert_eq!(config.equalizer.band_count, 5);
        assert_eq!(config.equalizer.decibel_scale, DecibelScale::Log10);
        assert_eq!(config.reactivation, ReactivationPolicy::Restart);
        assert_eq!(config.tracks.len(), 3);
    }

    #[test]
    fn test_group_ids_in_registry_order() {
        let config = MixerConfig::from_json_str(MINIMAL).unwrap();
        assert_eq!(
            config.group_ids(),
            vec![GroupId::from("drums"), GroupId::from("bass")]
        );
    }

    #[test]
    fn test_partial_sections() {
        let json = r#"{
            "tempo": { "bpm": 90 },
            "equalizer": { "decibel_scale": "natural_log" },
            "reactivation": "ignore",
            "tracks": [ { "control": "a", "group": "g", "asset": "a.wav" } ]
        }"#;
        let config = MixerConfig::from_json_str(json).unwrap();
        assert_eq!(config.tempo.bpm, 90.0);
        assert_eq!(config.tempo.beats_per_measure, 4);
        assert_eq!(config.equalizer.decibel_scale, DecibelScale::NaturalLog);
        assert_eq!(config.reactivation, ReactivationPolicy::Ignore);
        assert_eq!(config.scheduler_settings().grid.measure_duration(), 60.0 / 90.0 * 4.0);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = MixerConfig::from_json_str(MINIMAL).unwrap();
        config.tracks.push(config.tracks[0].clone());
        assert_eq!(config.validate().unwrap_err().error_code(), "INVALID_CONFIG");

        let mut config = MixerConfig::from_json_str(MINIMAL).unwrap();
        config.tempo.bpm = 0.0;
        assert!(config.validate().is_err());

        let mut config = MixerConfig::from_json_str(MINIMAL).unwrap();
        config.equalizer.band_count = 1;
        assert_eq!(config.validate().unwrap_err().error_code(), "INVALID_BAND_COUNT");

        let mut config = MixerConfig::from_json_str(MINIMAL).unwrap();
        config.sample_rate = 100;
        assert!(config.validate().is_err());

        assert!(MixerConfig::from_json_str(r#"{ "tracks": [] }"#).is_err());
        assert_eq!(
            MixerConfig::from_json_str("{}").unwrap_err().error_code(),
            "SERIALIZATION_ERROR"
        );
    }

    #[test]
    fn test_load_resolves_asset_root_against_config_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mix.json");
        let mut config = MixerConfig::from_json_str(MINIMAL).unwrap();
        config.asset_root = PathBuf::from("loops");
        config.save(&path).unwrap();

        let loaded = MixerConfig::load(&path).unwrap();
        assert_eq!(loaded.asset_root, dir.path().join("loops"));
        assert_eq!(loaded.tracks, config.tracks);
    }

    #[test]
    fn test_script_parses_and_sorts() {
        let json = r#"{
            "events": [
                { "at": 4.0, "action": "toggle", "control": "bass-1", "on": false },
                { "at": 0.0, "action": "toggle", "control": "drums-1", "on": true },
                { "at": 1.5, "action": "set_band", "band": 2, "gain_db": -6.0 },
                { "at": 1.5, "action": "set_master_gain", "gain": 0.5 }
            ]
        }"#;
        let script = SessionScript::from_json_str(json).unwrap();
        let times: Vec<f64> = script.events.iter().map(|e| e.at).collect();
        assert_eq!(times, vec![0.0, 1.5, 1.5, 4.0]);
        assert_eq!(
            script.events[1].action,
            ScriptAction::SetBand {
                band: 2,
                gain_db: Some(-6.0),
                q: None,
            }
        );
        assert_eq!(script.events[2].action, ScriptAction::SetMasterGain { gain: 0.5 });
        assert_eq!(script.last_event_time(), 4.0);
    }

    #[test]
    fn test_script_rejects_negative_time() {
        let json = r#"{ "events": [ { "at": -1.0, "action": "set_master_gain", "gain": 1.0 } ] }"#;
        assert!(SessionScript::from_json_str(json).is_err());
    }
}
