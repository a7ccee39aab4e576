//! Store scenarios
//!
//! End-to-end walks through the keyed collections, acquisition ordering and
//! completion on a single node.

use crate::prelude::*;

#[test]
fn last_trigger_of_non_durable_job_takes_the_job_with_it() {
    let grid = Arc::new(MemoryGrid::new("scenarios"));
    let node = Node::join(&grid, "node-a");
    node.store
        .store_job_and_trigger(job("J1"), trigger("TR1", "J1", Schedule::once(), T0))
        .unwrap();

    assert_eq!(node.run_due(), vec![TriggerKey::named("TR1")]);

    assert!(!node.store.check_trigger_exists(&TriggerKey::named("TR1")).unwrap());
    assert!(!node.store.check_job_exists(&JobKey::named("J1")).unwrap());
    assert!(node
        .signals
        .calls()
        .contains(&Signal::JobDeleted(JobKey::named("J1"))));
    assert_eq!(node.store.get_number_of_jobs().unwrap(), 0);
}

#[test]
fn removing_a_durable_jobs_last_trigger_keeps_the_job() {
    let grid = Arc::new(MemoryGrid::new("scenarios"));
    let node = Node::join(&grid, "node-a");
    node.store
        .store_job_and_trigger(
            job("J1").durable(),
            trigger("TR1", "J1", every_minute(), T0),
        )
        .unwrap();

    assert!(node.store.remove_trigger(&TriggerKey::named("TR1")).unwrap());
    assert!(node.store.check_job_exists(&JobKey::named("J1")).unwrap());
    assert!(node.store.get_triggers_for_job(&JobKey::named("J1")).unwrap().is_empty());
}

#[test]
fn acquisition_orders_by_time_then_priority() {
    let grid = Arc::new(MemoryGrid::new("scenarios"));
    let node = Node::join(&grid, "node-a");
    node.store.store_job(job("j").durable(), false).unwrap();
    for (name, offset, priority) in [("T1", 0, 5), ("T2", 0, 10), ("T3", 100, 5)] {
        let t = trigger(name, "j", every_minute(), T0 + offset).with_priority(priority);
        node.store.store_trigger(t, false).unwrap();
    }
    node.clock.advance(Duration::from_millis(100));

    assert_eq!(
        node.acquire(10),
        vec![TriggerKey::named("T2"), TriggerKey::named("T1")]
    );
    assert_eq!(node.acquire(10), vec![TriggerKey::named("T3")]);
}

#[test]
fn equal_triggers_break_ties_by_key() {
    let grid = Arc::new(MemoryGrid::new("scenarios"));
    let node = Node::join(&grid, "node-a");
    node.store.store_job(job("j").durable(), false).unwrap();
    for name in ["b", "a"] {
        let mut t = trigger(name, "j", Schedule::once(), T0);
        t.key = TriggerKey::new(name, "g");
        node.store.store_trigger(t, false).unwrap();
    }

    assert_eq!(node.acquire(1), vec![TriggerKey::new("a", "g")]);
    assert_eq!(node.acquire(1), vec![TriggerKey::new("b", "g")]);
}

#[test]
fn paused_group_holds_back_new_triggers_until_resumed() {
    let grid = Arc::new(MemoryGrid::new("scenarios"));
    let node = Node::join(&grid, "node-a");
    node.store
        .pause_triggers(&GroupMatcher::group_equals("DEFAULT"))
        .unwrap();
    node.store
        .store_job_and_trigger(job("j"), trigger("t", "j", every_minute(), T0))
        .unwrap();

    assert_eq!(node.state("t"), TriggerState::Paused);
    assert!(node.acquire(10).is_empty());

    node.store.resume_all().unwrap();
    assert_eq!(node.acquire(10), vec![TriggerKey::named("t")]);
}
