//! Mixer session
//!
//! Binds the track registry to the scheduler: one on/off control per track,
//! enabled once its asset has loaded and disabled for good if it fails.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::assets::{load_all, AssetLoader, LoadOutcome, LoadRequest};
use crate::config::{MixerConfig, ScriptAction, SessionScript};
use crate::dsp::{BandUpdate, SignalChain};
use crate::engine::{AudioBuffer, AudioContext, AudioEngine, AudioSourcePlayer, ChannelLayout};
use crate::error::{MixerError, Result};
use crate::scheduler::{
    Activation, ControlId, Deactivation, GroupId, LoopScheduler, TrackId,
};

/// Lifecycle of a track's control
#[derive(Debug, Clone)]
pub enum ControlState {
    /// Asset fetch or decode still in flight
    Loading,
    /// Decoded and playable
    Ready(Arc<AudioBuffer>),
    /// Load failed; the control never becomes usable
    Disabled(String),
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlState::Loading => write!(f, "loading"),
            ControlState::Ready(_) => write!(f, "ready"),
            ControlState::Disabled(reason) => write!(f, "disabled ({})", reason),
        }
    }
}

/// The on/off control bound to one track
#[derive(Debug, Clone)]
pub struct TrackControl {
    id: ControlId,
    group: GroupId,
    track: TrackId,
    asset: String,
    state: ControlState,
    on: bool,
}

impl TrackControl {
    pub fn id(&self) -> &ControlId {
        &self.id
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn track(&self) -> &TrackId {
        &self.track
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ControlState::Ready(_))
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.state, ControlState::Disabled(_))
    }

    /// Whether the control is toggled on
    pub fn is_on(&self) -> bool {
        self.on
    }
}

/// What a toggle did
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleEffect {
    Activated(Activation),
    Deactivated(Deactivation),
    NoChange,
}

/// Track controls plus the scheduler that plays them
pub struct MixerSession<E: AudioEngine> {
    engine: E,
    scheduler: LoopScheduler,
    controls: Vec<TrackControl>,
    index: HashMap<ControlId, usize>,
}

impl<E: AudioEngine> MixerSession<E> {
    /// Build the group map and controls from the registry
    ///
    /// Every control starts in `Loading`.
    pub fn new(config: &MixerConfig, engine: E) -> Self {
        let scheduler = LoopScheduler::new(config.group_ids(), config.scheduler_settings());
        let controls: Vec<TrackControl> = config
            .tracks
            .iter()
            .map(|entry| TrackControl {
                id: entry.control.clone(),
                group: entry.group.clone(),
                track: TrackId::new(entry.control.as_str()),
                asset: entry.asset.clone(),
                state: ControlState::Loading,
                on: false,
            })
            .collect();
        let index = controls
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        Self {
            engine,
            scheduler,
            controls,
            index,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn scheduler(&self) -> &LoopScheduler {
        &self.scheduler
    }

    /// Controls in registry order
    pub fn controls(&self) -> &[TrackControl] {
        &self.controls
    }

    pub fn control(&self, id: &ControlId) -> Option<&TrackControl> {
        self.index.get(id).map(|&i| &self.controls[i])
    }

    /// Asset requests for controls that are still loading
    pub fn pending_loads(&self) -> Vec<LoadRequest> {
        self.controls
            .iter()
            .filter(|c| matches!(c.state, ControlState::Loading))
            .map(|c| LoadRequest {
                control: c.id.clone(),
                url: c.asset.clone(),
            })
            .collect()
    }

    /// Record load results, enabling or permanently disabling each control
    ///
    /// Returns the number of controls that became ready.
    pub fn apply_loaded(&mut self, outcomes: Vec<LoadOutcome>) -> usize {
        let mut ready = 0;
        for outcome in outcomes {
            let Some(&i) = self.index.get(&outcome.control) else {
                warn!(control = %outcome.control, "Load result for unknown control");
                continue;
            };
            let control = &mut self.controls[i];
            if !matches!(control.state, ControlState::Loading) {
                continue;
            }
            match outcome.result {
                Ok(buffer) => {
                    info!(
                        control = %control.id,
                        frames = buffer.len(),
                        "Track ready"
                    );
                    control.state = ControlState::Ready(buffer);
                    ready += 1;
                }
                Err(e) => {
                    warn!(
                        control = %control.id,
                        url = %outcome.url,
                        code = e.error_code(),
                        error = %e,
                        "Track failed to load, control disabled"
                    );
                    control.state = ControlState::Disabled(e.to_string());
                }
            }
        }
        ready
    }

    /// Load every pending asset and apply the results
    pub async fn load_assets<L>(&mut self, loader: Arc<L>) -> usize
    where
        L: AssetLoader + ?Sized + 'static,
    {
        let outcomes = load_all(loader, self.pending_loads()).await;
        self.apply_loaded(outcomes)
    }

    /// Turn a track's control on or off
    ///
    /// On schedules the track in its group and switches off whichever
    /// control it replaced. Off stops the group only if this control owns
    /// the group's current loop.
    ///
    /// # Errors
    /// * `UnknownControl` - not in the registry
    /// * `ControlUnavailable` - still loading, or disabled by a failed load
    pub fn toggle(&mut self, id: &ControlId, on: bool) -> Result<ToggleEffect> {
        let i = *self
            .index
            .get(id)
            .ok_or_else(|| MixerError::UnknownControl {
                control: id.to_string(),
            })?;

        let buffer = match &self.controls[i].state {
            ControlState::Ready(buffer) => Arc::clone(buffer),
            ControlState::Loading => {
                return Err(MixerError::ControlUnavailable {
                    control: id.to_string(),
                    reason: "asset still loading".to_string(),
                })
            }
            ControlState::Disabled(reason) => {
                return Err(MixerError::ControlUnavailable {
                    control: id.to_string(),
                    reason: reason.clone(),
                })
            }
        };
        let group = self.controls[i].group.clone();

        if on {
            let player = AudioSourcePlayer::new(buffer);
            let activation = self.scheduler.activate(
                &mut self.engine,
                &group,
                self.controls[i].track.clone(),
                &player,
                Some(id.clone()),
            )?;
            if let Some(replaced) = activation.replaced.as_ref().and_then(|r| r.control.as_ref()) {
                if replaced != id {
                    if let Some(&j) = self.index.get(replaced) {
                        self.controls[j].on = false;
                    }
                }
            }
            self.controls[i].on = true;
            return Ok(ToggleEffect::Activated(activation));
        }

        self.controls[i].on = false;
        let owns_group = self
            .scheduler
            .group(&group)
            .and_then(|g| g.active_control())
            == Some(id);
        if !owns_group {
            return Ok(ToggleEffect::NoChange);
        }

        Ok(self
            .scheduler
            .deactivate(&mut self.engine, &group)?
            .map_or(ToggleEffect::NoChange, ToggleEffect::Deactivated))
    }
}

impl MixerSession<AudioContext> {
    /// Build an offline session whose engine uses the configured equalizer
    ///
    /// # Errors
    /// * `AudioUnsupported` - sample rate outside the engine's range
    /// * `InvalidBandCount` - fewer than two bands
    pub fn offline(config: &MixerConfig) -> Result<Self> {
        AudioContext::check_sample_rate(config.sample_rate)?;
        let eq = &config.equalizer;
        let chain = SignalChain::with_bands(config.sample_rate, eq.band_count, eq.margin_hz)?
            .with_decibel_scale(eq.decibel_scale);
        Ok(Self::new(config, AudioContext::with_chain(config.sample_rate, chain)))
    }

    /// Apply one scripted action at the current engine time
    ///
    /// A toggle on an unusable control is logged and skipped, the same way
    /// a disabled UI control would ignore a click.
    pub fn apply_action(&mut self, action: &ScriptAction) -> Result<()> {
        match action {
            ScriptAction::Toggle { control, on } => match self.toggle(control, *on) {
                Ok(ToggleEffect::Activated(activation)) => {
                    info!(
                        control = %control,
                        start_time = activation.start_time,
                        outcome = ?activation.outcome,
                        "Toggle on"
                    );
                    Ok(())
                }
                Ok(effect) => {
                    debug!(control = %control, ?effect, "Toggle off");
                    Ok(())
                }
                Err(e @ MixerError::ControlUnavailable { .. }) => {
                    warn!(control = %control, error = %e, "Ignoring toggle");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            ScriptAction::SetBand { band, gain_db, q } => self.engine.chain_mut().set_band_parameter(
                *band,
                BandUpdate {
                    q: *q,
                    gain_db: *gain_db,
                },
            ),
            ScriptAction::SetMasterGain { gain } => {
                self.engine.chain_mut().set_master_gain(*gain);
                Ok(())
            }
        }
    }

    /// Replay a script and render the mix up to `end_time`
    ///
    /// Events after `end_time` are not applied.
    pub fn render_script(
        &mut self,
        script: &SessionScript,
        end_time: f64,
        block_size: usize,
    ) -> Result<AudioBuffer> {
        let sample_rate = self.engine.sample_rate();
        let mut mix = AudioBuffer::new(0, ChannelLayout::Stereo, sample_rate);

        for event in script.events.iter().take_while(|e| e.at <= end_time) {
            mix.append(&self.engine.render_until(event.at, block_size));
            self.apply_action(&event.action)?;
        }
        mix.append(&self.engine.render_until(end_time, block_size));
        Ok(mix)
    }
}
