// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_helpers::{at, every_minute, job, once, Harness, T0};
use cj_core::{
    JobKey, MisfireInstruction, Operation, Schedule, Signal, Trigger, TriggerKey, TriggerState,
    TriggerWrapper,
};
use std::time::Duration;

fn keys(triggers: &[Trigger]) -> Vec<String> {
    triggers.iter().map(|t| t.key.name.clone()).collect()
}

/// T1 and T2 share a fire time (T2 has higher priority); T3 fires later
fn ordering_fixture() -> Harness {
    let h = Harness::new();
    h.schedule(job("j").durable(), every_minute("T1", "j", T0 + 10));
    h.schedule(job("j"), every_minute("T2", "j", T0 + 10).with_priority(10));
    h.schedule(job("j"), every_minute("T3", "j", T0 + 20));
    h
}

#[test]
fn batch_is_ordered_and_stays_within_one_window() {
    let h = ordering_fixture();

    let first = h
        .store
        .acquire_next_triggers(at(T0 + 20), 10, Duration::ZERO)
        .unwrap();
    assert_eq!(keys(&first), vec!["T2", "T1"]);

    let second = h
        .store
        .acquire_next_triggers(at(T0 + 20), 10, Duration::ZERO)
        .unwrap();
    assert_eq!(keys(&second), vec!["T3"]);
}

#[test]
fn window_widens_the_batch() {
    let h = ordering_fixture();
    let acquired = h
        .store
        .acquire_next_triggers(at(T0 + 10), 10, Duration::from_millis(10))
        .unwrap();
    assert_eq!(keys(&acquired), vec!["T2", "T1", "T3"]);
}

#[test]
fn nothing_past_no_later_than_plus_window() {
    let h = ordering_fixture();
    let acquired = h
        .store
        .acquire_next_triggers(at(T0), 10, Duration::from_millis(15))
        .unwrap();
    assert_eq!(keys(&acquired), vec!["T2", "T1"]);
    assert_eq!(
        h.store.get_trigger_state(&TriggerKey::named("T3")).unwrap(),
        TriggerState::Normal
    );
}

#[test]
fn equal_time_and_priority_break_ties_by_key() {
    let h = Harness::new();
    h.store.store_job(job("j").durable(), false).unwrap();
    for name in ["b", "a"] {
        let trigger = Trigger::new(
            TriggerKey::new(name, "g"),
            JobKey::named("j"),
            Schedule::once(),
            at(T0),
        );
        h.store.store_trigger(trigger, false).unwrap();
    }

    let acquired = h
        .store
        .acquire_next_triggers(at(T0), 1, Duration::ZERO)
        .unwrap();
    assert_eq!(acquired[0].key, TriggerKey::new("a", "g"));
}

#[test]
fn max_count_bounds_the_batch() {
    let h = ordering_fixture();
    assert!(h
        .store
        .acquire_next_triggers(at(T0 + 20), 0, Duration::ZERO)
        .unwrap()
        .is_empty());
    let acquired = h
        .store
        .acquire_next_triggers(at(T0 + 20), 1, Duration::ZERO)
        .unwrap();
    assert_eq!(keys(&acquired), vec!["T2"]);
}

#[test]
fn acquired_trigger_is_marked_with_instance_and_fire_id() {
    let h = ordering_fixture();
    let acquired = h
        .store
        .acquire_next_triggers(at(T0 + 20), 2, Duration::ZERO)
        .unwrap();

    assert_eq!(acquired[0].fire_instance_id.as_deref(), Some("node-a-1"));
    assert_eq!(acquired[1].fire_instance_id.as_deref(), Some("node-a-2"));
    assert_eq!(
        h.store.get_trigger_state(&TriggerKey::named("T2")).unwrap(),
        TriggerState::Acquired
    );
}

#[test]
fn paused_triggers_are_not_acquired() {
    let h = ordering_fixture();
    h.store.pause_trigger(&TriggerKey::named("T2")).unwrap();
    let acquired = h
        .store
        .acquire_next_triggers(at(T0 + 20), 10, Duration::ZERO)
        .unwrap();
    assert_eq!(keys(&acquired), vec!["T1"]);
}

#[test]
fn released_trigger_can_be_acquired_again() {
    let h = Harness::new();
    h.schedule(job("j"), every_minute("t", "j", T0));
    assert_eq!(h.acquire_due(), vec![TriggerKey::named("t")]);
    assert!(h.acquire_due().is_empty());

    h.store.release_acquired_trigger(&TriggerKey::named("t")).unwrap();
    assert_eq!(
        h.store.get_trigger_state(&TriggerKey::named("t")).unwrap(),
        TriggerState::Normal
    );
    assert_eq!(h.acquire_due(), vec![TriggerKey::named("t")]);
}

#[test]
fn overdue_repeating_trigger_is_rescheduled_not_acquired() {
    let h = Harness::new();
    h.schedule(job("j"), every_minute("t", "j", T0 - 120_000));

    assert!(h.acquire_due().is_empty());

    let stored = h.store.retrieve_trigger(&TriggerKey::named("t")).unwrap().unwrap();
    assert_eq!(stored.next_fire_time, Some(at(T0 + 60_000)));
    assert_eq!(h.signals.calls(), vec![Signal::Misfired(TriggerKey::named("t"))]);
}

#[test]
fn overdue_one_shot_fires_now() {
    let h = Harness::new();
    h.schedule(job("j"), once("t", "j", T0 - 120_000));

    let acquired = h
        .store
        .acquire_next_triggers(at(T0), 1, Duration::ZERO)
        .unwrap();
    assert_eq!(acquired.len(), 1);
    assert_eq!(acquired[0].next_fire_time, Some(at(T0)));
}

#[test]
fn ignore_misfire_policy_fires_at_the_missed_time() {
    let h = Harness::new();
    let trigger = every_minute("t", "j", T0 - 120_000)
        .with_misfire_instruction(MisfireInstruction::IgnoreMisfirePolicy);
    h.schedule(job("j"), trigger);

    let acquired = h
        .store
        .acquire_next_triggers(at(T0), 1, Duration::ZERO)
        .unwrap();
    assert_eq!(acquired[0].next_fire_time, Some(at(T0 - 120_000)));
    assert!(h.signals.calls().is_empty());
}

#[test]
fn late_trigger_within_threshold_is_acquired() {
    let h = Harness::new();
    h.schedule(job("j"), every_minute("t", "j", T0 - 30_000));
    assert_eq!(h.acquire_due(), vec![TriggerKey::named("t")]);
}

#[test]
fn orphaned_trigger_is_reaped() {
    let h = Harness::new();
    {
        let mut grid = h.grid.lock("test").unwrap();
        let wrapper = TriggerWrapper::new(every_minute("orphan", "gone", T0), TriggerState::Normal);
        grid.apply(Operation::TriggerStore { wrapper }).unwrap();
        grid.commit().unwrap();
    }

    assert!(h.acquire_due().is_empty());
    assert!(!h
        .store
        .check_trigger_exists(&TriggerKey::named("orphan"))
        .unwrap());
}

#[test]
fn one_trigger_per_disallow_concurrent_job_per_batch() {
    let h = Harness::new();
    h.schedule(
        job("j").disallow_concurrent_execution(),
        every_minute("t1", "j", T0),
    );
    h.schedule(job("j"), every_minute("t2", "j", T0));
    h.schedule(job("other"), every_minute("t3", "other", T0));

    let acquired = h.acquire_due();
    assert_eq!(
        acquired,
        vec![TriggerKey::named("t1"), TriggerKey::named("t3")]
    );
    // The sibling stays out while t1 is acquired
    assert!(h.acquire_due().is_empty());
}

#[test]
fn blocked_sibling_is_acquirable_after_completion() {
    let h = Harness::new();
    h.schedule(
        job("j").disallow_concurrent_execution(),
        every_minute("t1", "j", T0),
    );
    h.schedule(job("j"), every_minute("t2", "j", T0));

    let acquired = h
        .store
        .acquire_next_triggers(at(T0), 10, Duration::ZERO)
        .unwrap();
    let fired = h.store.triggers_fired(&acquired).unwrap();
    assert!(h.acquire_due().is_empty());

    let bundle = fired[0].bundle.clone().unwrap();
    h.store
        .triggered_job_complete(
            &bundle.trigger,
            &bundle.job,
            cj_core::CompletedExecutionInstruction::Noop,
        )
        .unwrap();
    assert_eq!(h.acquire_due(), vec![TriggerKey::named("t2")]);
}
