//! Beat-synchronized loop scheduler
//!
//! Each group is Idle or Playing. Starting a loop snaps it to the shared
//! downbeat grid; swapping loops inside a group stops the outgoing one on
//! the same boundary the incoming one starts on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::group::{ActiveLoop, MusicGroup};
use super::ids::{ControlId, GroupId, TrackId};
use super::timeline::{SessionTimeline, TempoGrid, DEFAULT_BUFFER_TIME_SECS};
use crate::engine::{AudioEngine, AudioSourcePlayer};
use crate::error::{MixerError, Result};

/// What to do when a group is asked to play the track it already plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactivationPolicy {
    /// Restart the loop on the next downbeat, exactly like a swap
    #[default]
    Restart,
    /// Leave the running loop alone
    Ignore,
}

/// Scheduler tuning, normally taken from configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    pub grid: TempoGrid,
    /// Lead time added to "now" so the start is never already in the past
    pub buffer_time_secs: f64,
    pub reactivation: ReactivationPolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            grid: TempoGrid::default(),
            buffer_time_secs: DEFAULT_BUFFER_TIME_SECS,
            reactivation: ReactivationPolicy::default(),
        }
    }
}

/// How an activation changed its group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Group went from Idle to Playing
    Started,
    /// Group switched to a different track
    Swapped,
    /// Group restarted the track it was already playing
    Restarted,
    /// Nothing was scheduled
    Unchanged,
}

/// The loop pushed out by an activation
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacedLoop {
    pub track_id: TrackId,
    /// UI control that should be switched off
    pub control: Option<ControlId>,
}

/// Result of `LoopScheduler::activate`
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// Engine time the new loop starts (and any replaced loop stops)
    pub start_time: f64,
    pub outcome: ActivationOutcome,
    pub replaced: Option<ReplacedLoop>,
}

/// Result of `LoopScheduler::deactivate` on a playing group
#[derive(Debug, Clone, PartialEq)]
pub struct Deactivation {
    pub track_id: TrackId,
    pub control: Option<ControlId>,
    /// Engine time at which the stop was requested
    pub stop_time: f64,
}

/// Owns all groups and the shared downbeat timeline
#[derive(Debug)]
pub struct LoopScheduler {
    groups: BTreeMap<GroupId, MusicGroup>,
    timeline: SessionTimeline,
    settings: SchedulerSettings,
}

impl LoopScheduler {
    /// Build the group map once; no groups are added later
    pub fn new<I>(group_ids: I, settings: SchedulerSettings) -> Self
    where
        I: IntoIterator<Item = GroupId>,
    {
        let groups = group_ids
            .into_iter()
            .map(|id| (id.clone(), MusicGroup::new(id)))
            .collect();
        Self {
            groups,
            timeline: SessionTimeline::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn timeline(&self) -> &SessionTimeline {
        &self.timeline
    }

    pub fn measure_duration(&self) -> f64 {
        self.settings.grid.measure_duration()
    }

    pub fn group(&self, id: &GroupId) -> Option<&MusicGroup> {
        self.groups.get(id)
    }

    /// Groups in id order
    pub fn groups(&self) -> impl Iterator<Item = &MusicGroup> {
        self.groups.values()
    }

    /// Start time an activation at engine time `now` would get
    pub fn next_start_time(&self, now: f64) -> f64 {
        self.timeline
            .align(now + self.settings.buffer_time_secs, self.measure_duration())
    }

    /// Start `track_id` looping in `group_id` on the next shared downbeat
    ///
    /// A loop already playing in the group is stopped at the same instant the
    /// new one starts.
    ///
    /// # Errors
    /// * `UnknownGroup` - the group was not registered at startup
    pub fn activate<E: AudioEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        group_id: &GroupId,
        track_id: TrackId,
        player: &AudioSourcePlayer,
        control: Option<ControlId>,
    ) -> Result<Activation> {
        let measure = self.settings.grid.measure_duration();
        let group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| MixerError::UnknownGroup {
                group: group_id.to_string(),
            })?;

        if self.settings.reactivation == ReactivationPolicy::Ignore
            && group.active_track() == Some(&track_id)
        {
            let start_time = group
                .active_handle()
                .map(|h| h.start_time())
                .unwrap_or_else(|| engine.current_time());
            debug!(group = %group_id, track = %track_id, "Track already playing, ignoring");
            return Ok(Activation {
                start_time,
                outcome: ActivationOutcome::Unchanged,
                replaced: None,
            });
        }

        let now = engine.current_time();
        let candidate = self
            .timeline
            .align(now + self.settings.buffer_time_secs, measure);
        debug!(
            group = %group_id,
            now,
            candidate,
            anchor = ?self.timeline.anchor_time(),
            "Aligned loop start"
        );

        let previous = group.take();
        let outcome = match &previous {
            None => ActivationOutcome::Started,
            Some(p) if p.track_id == track_id => ActivationOutcome::Restarted,
            Some(_) => ActivationOutcome::Swapped,
        };
        let replaced = match previous {
            Some(outgoing) => {
                outgoing.handle.stop(engine, candidate);
                Some(ReplacedLoop {
                    track_id: outgoing.track_id,
                    control: outgoing.control,
                })
            }
            None => None,
        };

        let handle = player.play(engine, candidate, true);
        info!(
            group = %group_id,
            track = %track_id,
            start_time = candidate,
            ?outcome,
            "Loop scheduled"
        );
        group.set_active(ActiveLoop {
            track_id,
            handle,
            control,
        });

        self.timeline
            .commit_start(candidate, outcome == ActivationOutcome::Started);

        Ok(Activation {
            start_time: candidate,
            outcome,
            replaced,
        })
    }

    /// Stop the group's loop now and return the group to Idle
    ///
    /// Returns `None` if the group was already idle.
    ///
    /// # Errors
    /// * `UnknownGroup` - the group was not registered at startup
    pub fn deactivate<E: AudioEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        group_id: &GroupId,
    ) -> Result<Option<Deactivation>> {
        let group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| MixerError::UnknownGroup {
                group: group_id.to_string(),
            })?;

        let Some(active) = group.take() else {
            debug!(group = %group_id, "Group already idle");
            return Ok(None);
        };

        let stop_time = engine.current_time();
        active.handle.stop(engine, 0.0);
        self.timeline.commit_stop();

        info!(
            group = %group_id,
            track = %active.track_id,
            active_groups = self.timeline.active_group_count(),
            "Loop stopped"
        );

        Ok(Some(Deactivation {
            track_id: active.track_id,
            control: active.control,
            stop_time,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AudioBuffer, EngineCall, MockEngine};
    use crate::scheduler::GroupState;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn player() -> AudioSourcePlayer {
        AudioSourcePlayer::new(Arc::new(
            AudioBuffer::from_channels(vec![vec![0.1; 32]], 48000).unwrap(),
        ))
    }

    fn scheduler(policy: ReactivationPolicy) -> LoopScheduler {
        LoopScheduler::new(
            [GroupId::from("a"), GroupId::from("b")],
            SchedulerSettings {
                reactivation: policy,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_first_activation_sets_anchor() {
        let mut engine = MockEngine::default();
        engine.set_time(5.0);
        let mut sched = scheduler(ReactivationPolicy::Restart);

        let act = sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();

        assert_relative_eq!(act.start_time, 5.002, epsilon = 1e-12);
        assert_eq!(act.outcome, ActivationOutcome::Started);
        assert_eq!(sched.timeline().anchor_time(), Some(act.start_time));
        assert_eq!(sched.timeline().active_group_count(), 1);
        assert_eq!(sched.group(&"a".into()).unwrap().state(), GroupState::Playing);
    }

    #[test]
    fn test_second_group_waits_for_next_downbeat() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Restart);

        engine.set_time(9.998);
        let first = sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();
        assert_relative_eq!(first.start_time, 10.0, epsilon = 1e-9);

        engine.set_time(10.001);
        let second = sched
            .activate(&mut engine, &"b".into(), "t2".into(), &player(), None)
            .unwrap();
        assert_relative_eq!(second.start_time, 12.0, epsilon = 1e-9);
        assert_eq!(sched.timeline().active_group_count(), 2);
    }

    #[test]
    fn test_pending_anchor_is_reused() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Restart);

        engine.set_time(0.0);
        sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();
        engine.set_time(0.5);
        let b = sched
            .activate(&mut engine, &"b".into(), "t2".into(), &player(), None)
            .unwrap();
        // Group b starts on 2.002; group a swapping before that reuses it
        engine.set_time(0.7);
        let swap = sched
            .activate(&mut engine, &"a".into(), "t3".into(), &player(), None)
            .unwrap();
        assert_relative_eq!(b.start_time, 2.002, epsilon = 1e-9);
        assert_eq!(swap.start_time, b.start_time);
    }

    #[test]
    fn test_swap_stops_and_starts_on_same_boundary() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Restart);

        sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), Some("c1".into()))
            .unwrap();
        let outgoing = sched.group(&"a".into()).unwrap().active_handle().unwrap().voice();

        engine.set_time(3.1);
        let act = sched
            .activate(&mut engine, &"a".into(), "t2".into(), &player(), Some("c2".into()))
            .unwrap();

        assert_eq!(act.outcome, ActivationOutcome::Swapped);
        assert_eq!(
            act.replaced,
            Some(ReplacedLoop {
                track_id: "t1".into(),
                control: Some("c1".into()),
            })
        );
        let incoming = sched.group(&"a".into()).unwrap().active_handle().unwrap().voice();
        assert_eq!(engine.stop_time_of(outgoing), Some(act.start_time));
        assert_eq!(engine.start_time_of(incoming), Some(act.start_time));
        assert_eq!(sched.timeline().active_group_count(), 1);
        assert_eq!(
            sched.group(&"a".into()).unwrap().active_control(),
            Some(&ControlId::from("c2"))
        );
    }

    #[test]
    fn test_reactivate_same_track_restarts() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Restart);

        sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();
        engine.set_time(1.0);
        let act = sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();

        assert_eq!(act.outcome, ActivationOutcome::Restarted);
        assert_relative_eq!(act.start_time, 2.002, epsilon = 1e-9);
        let starts = engine
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Start { .. }))
            .count();
        assert_eq!(starts, 2);
        assert_eq!(sched.timeline().active_group_count(), 1);
    }

    #[test]
    fn test_reactivate_same_track_ignored() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Ignore);

        let first = sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();
        engine.set_time(1.0);
        engine.clear_calls();
        let act = sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();

        assert_eq!(act.outcome, ActivationOutcome::Unchanged);
        assert_eq!(act.start_time, first.start_time);
        assert!(engine.calls().is_empty());
        assert_eq!(sched.timeline().anchor_time(), Some(first.start_time));

        // A different track still swaps
        let swap = sched
            .activate(&mut engine, &"a".into(), "t2".into(), &player(), None)
            .unwrap();
        assert_eq!(swap.outcome, ActivationOutcome::Swapped);
    }

    #[test]
    fn test_deactivate_last_group_resets_timeline() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Restart);

        sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();
        let voice = sched.group(&"a".into()).unwrap().active_handle().unwrap().voice();

        engine.set_time(4.0);
        let stopped = sched.deactivate(&mut engine, &"a".into()).unwrap().unwrap();
        assert_eq!(stopped.track_id, TrackId::from("t1"));
        assert_eq!(stopped.stop_time, 4.0);
        assert_eq!(engine.stop_time_of(voice), Some(0.0));
        assert_eq!(sched.timeline().anchor_time(), None);
        assert_eq!(sched.timeline().active_group_count(), 0);

        // Fresh phase origin, no alignment to the old grid
        engine.set_time(4.7);
        let act = sched
            .activate(&mut engine, &"b".into(), "t2".into(), &player(), None)
            .unwrap();
        assert_relative_eq!(act.start_time, 4.702, epsilon = 1e-12);
        assert_eq!(act.outcome, ActivationOutcome::Started);
    }

    #[test]
    fn test_deactivate_idle_group_is_noop() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Restart);
        assert_eq!(sched.deactivate(&mut engine, &"a".into()).unwrap(), None);
        assert_eq!(sched.timeline().active_group_count(), 0);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_unknown_group() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Restart);
        let err = sched
            .activate(&mut engine, &"nope".into(), "t".into(), &player(), None)
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_GROUP");
        assert!(sched.deactivate(&mut engine, &"nope".into()).is_err());
    }

    #[test]
    fn test_next_start_time_preview_matches_activation() {
        let mut engine = MockEngine::default();
        let mut sched = scheduler(ReactivationPolicy::Restart);
        sched
            .activate(&mut engine, &"a".into(), "t1".into(), &player(), None)
            .unwrap();
        engine.set_time(7.3);
        let preview = sched.next_start_time(7.3);
        let act = sched
            .activate(&mut engine, &"b".into(), "t2".into(), &player(), None)
            .unwrap();
        assert_eq!(preview, act.start_time);
    }
}
