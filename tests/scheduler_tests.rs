//! Scheduler Tests
//!
//! Downbeat alignment across groups, driven through the public API with a
//! recording engine.

use std::sync::Arc;

use approx::assert_relative_eq;
use beatmix::engine::{AudioBuffer, AudioSourcePlayer, EngineCall, MockEngine};
use beatmix::scheduler::{
    ActivationOutcome, GroupId, GroupState, LoopScheduler, SchedulerSettings, TempoGrid,
};

fn player(value: f32) -> AudioSourcePlayer {
    AudioSourcePlayer::new(Arc::new(
        AudioBuffer::from_channels(vec![vec![value; 128]], 48000).unwrap(),
    ))
}

fn two_groups() -> LoopScheduler {
    LoopScheduler::new(
        [GroupId::from("a"), GroupId::from("b")],
        SchedulerSettings::default(),
    )
}

#[test]
fn test_end_to_end_two_groups() {
    let mut engine = MockEngine::default();
    let mut sched = two_groups();
    let a = GroupId::from("a");
    let b = GroupId::from("b");

    // A starts the timeline
    let first = sched
        .activate(&mut engine, &a, "a1".into(), &player(0.1), None)
        .unwrap();
    assert_relative_eq!(first.start_time, 0.002, epsilon = 1e-12);
    assert_eq!(sched.timeline().anchor_time(), Some(first.start_time));

    // B waits for the next downbeat
    engine.set_time(1.0);
    let second = sched
        .activate(&mut engine, &b, "b1".into(), &player(0.2), None)
        .unwrap();
    assert_relative_eq!(second.start_time, 2.002, epsilon = 1e-9);
    assert_eq!(sched.timeline().active_group_count(), 2);

    // A stops, B keeps the anchor alive
    engine.set_time(3.0);
    let stopped = sched.deactivate(&mut engine, &a).unwrap();
    assert!(stopped.is_some());
    assert_eq!(sched.group(&a).unwrap().state(), GroupState::Idle);
    assert_eq!(sched.timeline().active_group_count(), 1);
    assert_eq!(sched.timeline().anchor_time(), Some(second.start_time));

    // A comes back on a different track, phase-locked to B
    engine.set_time(3.5);
    let third = sched
        .activate(&mut engine, &a, "a2".into(), &player(0.3), None)
        .unwrap();
    assert_eq!(third.outcome, ActivationOutcome::Started);
    assert_relative_eq!(third.start_time, 4.002, epsilon = 1e-9);
    assert_eq!(sched.timeline().active_group_count(), 2);
}

#[test]
fn test_every_loop_is_scheduled_looping() {
    let mut engine = MockEngine::default();
    let mut sched = two_groups();
    sched
        .activate(&mut engine, &"a".into(), "a1".into(), &player(0.1), None)
        .unwrap();
    sched
        .activate(&mut engine, &"b".into(), "b1".into(), &player(0.1), None)
        .unwrap();

    assert!(engine.calls().iter().all(|call| matches!(
        call,
        EngineCall::Start { looping: true, frames: 128, .. }
    )));
}

#[test]
fn test_late_joiner_on_exact_downbeat_is_not_pushed_a_measure() {
    let mut engine = MockEngine::default();
    let mut sched = two_groups();

    engine.set_time(0.1);
    let first = sched
        .activate(&mut engine, &"a".into(), "a1".into(), &player(0.1), None)
        .unwrap();
    assert_relative_eq!(first.start_time, 0.102, epsilon = 1e-9);

    // Sixteen measures later "now + buffer" sits exactly on a downbeat
    engine.set_time(32.1);
    let second = sched
        .activate(&mut engine, &"b".into(), "b1".into(), &player(0.2), None)
        .unwrap();
    assert_relative_eq!(second.start_time, 32.102, epsilon = 1e-9);
}

#[test]
fn test_starts_land_on_grid_of_first_anchor() {
    let mut engine = MockEngine::default();
    let mut sched = LoopScheduler::new(
        [GroupId::from("a"), GroupId::from("b")],
        SchedulerSettings {
            grid: TempoGrid::new(90.0, 3),
            ..Default::default()
        },
    );
    let measure = sched.measure_duration();

    engine.set_time(0.5);
    let anchor = sched
        .activate(&mut engine, &"a".into(), "a1".into(), &player(0.1), None)
        .unwrap()
        .start_time;

    for now in [0.9, 2.7, 5.3, 11.0] {
        engine.set_time(now);
        let start = sched
            .activate(&mut engine, &"b".into(), "b1".into(), &player(0.1), None)
            .unwrap()
            .start_time;
        assert!(start >= now);
        let measures = (start - anchor) / measure;
        assert_relative_eq!(measures, measures.round(), epsilon = 1e-6);
    }
}
