//! Loop scheduling
//!
//! Groups of mutually exclusive loops that all start on a shared grid of
//! measure downbeats.

mod group;
mod ids;
mod loop_scheduler;
mod timeline;

pub use group::{ActiveLoop, GroupState, MusicGroup};
pub use ids::{ControlId, GroupId, TrackId};
pub use loop_scheduler::{
    Activation, ActivationOutcome, Deactivation, LoopScheduler, ReactivationPolicy, ReplacedLoop,
    SchedulerSettings,
};
pub use timeline::{
    SessionTimeline, TempoGrid, DEFAULT_BEATS_PER_MEASURE, DEFAULT_BPM, DEFAULT_BUFFER_TIME_SECS,
    ON_GRID_TOLERANCE_SECS,
};
