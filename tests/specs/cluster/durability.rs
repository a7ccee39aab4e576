//! Grid durability specs
//!
//! A grid backed by a write-ahead log comes back with the same jobs,
//! triggers, paused groups and blocked jobs after a restart. A grid that
//! has been shut down refuses every operation.

use crate::prelude::*;

#[test]
fn reopened_grid_reproduces_the_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let wal = dir.path().join("grid.wal");

    {
        let grid = Arc::new(MemoryGrid::open("durable", &wal).unwrap());
        let node = Node::join(&grid, "node-a");
        node.store.store_job(job("j").durable(), false).unwrap();
        node.store
            .store_trigger(trigger("t1", "j", every_minute(), T0), false)
            .unwrap();
        node.store
            .store_trigger(trigger("t2", "j", every_minute(), T0 + 1_000), false)
            .unwrap();
        node.store
            .pause_jobs(&GroupMatcher::group_equals("reports"))
            .unwrap();
        node.store.remove_trigger(&TriggerKey::named("t2")).unwrap();
        assert_eq!(node.acquire(10), vec![TriggerKey::named("t1")]);
        grid.shutdown();
    }

    let grid = Arc::new(MemoryGrid::open("durable", &wal).unwrap());
    let node = Node::join(&grid, "node-a");
    assert!(node.store.supports_persistence());
    assert!(node.store.check_job_exists(&JobKey::named("j")).unwrap());
    assert!(!node.store.check_trigger_exists(&TriggerKey::named("t2")).unwrap());
    assert!(node.store.is_job_group_paused("reports").unwrap());
    assert_eq!(node.state("t1"), TriggerState::Acquired);

    node.store.scheduler_started().unwrap();
    assert_eq!(node.state("t1"), TriggerState::Normal);
    assert_eq!(node.acquire(10), vec![TriggerKey::named("t1")]);
}

#[test]
fn shut_down_grid_surfaces_persistence_unavailable() {
    let grid = Arc::new(MemoryGrid::new("doomed"));
    let node = Node::join(&grid, "node-a");
    node.store.store_job(job("j").durable(), false).unwrap();
    grid.shutdown();

    let errors = [
        node.store.store_job(job("k"), false).unwrap_err(),
        node.store.retrieve_job(&JobKey::named("j")).unwrap_err(),
        node.store
            .acquire_next_triggers(at(T0), 1, Duration::ZERO)
            .unwrap_err(),
        node.store.pause_all().unwrap_err(),
        node.store.scheduler_started().unwrap_err(),
    ];
    for err in errors {
        assert!(
            matches!(err, JobStoreError::PersistenceUnavailable(_)),
            "unexpected error: {err}"
        );
    }
}
