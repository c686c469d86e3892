//! Mutually exclusive playback groups

use std::fmt;

use super::ids::{ControlId, GroupId, TrackId};
use crate::engine::LoopPlaybackHandle;

/// Whether a group currently owns a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Idle,
    Playing,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupState::Idle => write!(f, "Idle"),
            GroupState::Playing => write!(f, "Playing"),
        }
    }
}

/// The loop a group is playing, with its handle and UI back-reference
#[derive(Debug)]
pub struct ActiveLoop {
    pub track_id: TrackId,
    pub handle: LoopPlaybackHandle,
    pub control: Option<ControlId>,
}

/// A group of loops of which at most one plays at a time
#[derive(Debug)]
pub struct MusicGroup {
    id: GroupId,
    active: Option<ActiveLoop>,
}

impl MusicGroup {
    pub fn new(id: GroupId) -> Self {
        Self { id, active: None }
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn state(&self) -> GroupState {
        if self.active.is_some() {
            GroupState::Playing
        } else {
            GroupState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_track(&self) -> Option<&TrackId> {
        self.active.as_ref().map(|a| &a.track_id)
    }

    pub fn active_control(&self) -> Option<&ControlId> {
        self.active.as_ref().and_then(|a| a.control.as_ref())
    }

    pub fn active_handle(&self) -> Option<&LoopPlaybackHandle> {
        self.active.as_ref().map(|a| &a.handle)
    }

    /// Install a new loop; the caller has already taken the previous one
    pub(crate) fn set_active(&mut self, next: ActiveLoop) {
        debug_assert!(self.active.is_none());
        self.active = Some(next);
    }

    /// Take the active loop out, leaving the group idle
    pub(crate) fn take(&mut self) -> Option<ActiveLoop> {
        self.active.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_group_is_idle() {
        let group = MusicGroup::new(GroupId::from("bass"));
        assert_eq!(group.state(), GroupState::Idle);
        assert!(group.active_track().is_none());
        assert!(group.active_handle().is_none());
        assert_eq!(group.state().to_string(), "Idle");
    }
}
