//! Cluster acquisition specs
//!
//! Several nodes share one grid; the cluster lock keeps their view of
//! trigger state consistent.

use crate::prelude::*;
use std::collections::HashSet;

#[test]
fn nodes_sharing_a_grid_never_acquire_the_same_trigger() {
    let grid = Arc::new(MemoryGrid::new("cluster"));
    let nodes: Vec<Node> = ["node-a", "node-b", "node-c"]
        .iter()
        .map(|id| Node::join(&grid, id))
        .collect();
    nodes[0].store.store_job(job("j").durable(), false).unwrap();
    for i in 0..60 {
        let t = trigger(&format!("t{i:02}"), "j", every_minute(), T0);
        nodes[0].store.store_trigger(t, false).unwrap();
    }

    let acquired: Vec<Vec<TriggerKey>> = std::thread::scope(|scope| {
        let handles: Vec<_> = nodes
            .iter()
            .map(|node| {
                scope.spawn(move || {
                    let mut mine = Vec::new();
                    loop {
                        let batch = node.acquire(4);
                        if batch.is_empty() {
                            break mine;
                        }
                        mine.extend(batch);
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let all: Vec<&TriggerKey> = acquired.iter().flatten().collect();
    let unique: HashSet<&TriggerKey> = all.iter().copied().collect();
    assert_eq!(all.len(), 60);
    assert_eq!(unique.len(), 60);
}

#[test]
fn executing_job_blocks_its_triggers_on_every_node() {
    let grid = Arc::new(MemoryGrid::new("cluster"));
    let a = Node::join(&grid, "node-a");
    let b = Node::join(&grid, "node-b");
    a.store
        .store_job(job("j").disallow_concurrent_execution(), false)
        .unwrap();
    a.store
        .store_trigger(trigger("t1", "j", every_minute(), T0), false)
        .unwrap();
    a.store
        .store_trigger(trigger("t2", "j", every_minute(), T0), false)
        .unwrap();

    let acquired = a
        .store
        .acquire_next_triggers(at(T0), 10, Duration::ZERO)
        .unwrap();
    assert_eq!(acquired.len(), 1);
    let bundle = a.store.triggers_fired(&acquired).unwrap()[0]
        .bundle
        .clone()
        .unwrap();

    // Node b sees the sibling blocked while node a runs the job
    assert_eq!(b.state("t2"), TriggerState::Blocked);
    assert!(b.acquire(10).is_empty());

    a.store
        .triggered_job_complete(
            &bundle.trigger,
            &bundle.job,
            CompletedExecutionInstruction::Noop,
        )
        .unwrap();
    assert_eq!(b.acquire(10), vec![TriggerKey::named("t2")]);
}

#[test]
fn restarted_node_releases_only_its_own_acquisitions() {
    let grid = Arc::new(MemoryGrid::new("cluster"));
    let a = Node::join(&grid, "node-a");
    let b = Node::join(&grid, "node-b");
    a.store.store_job(job("j").durable(), false).unwrap();
    for name in ["t1", "t2"] {
        a.store
            .store_trigger(trigger(name, "j", every_minute(), T0), false)
            .unwrap();
    }
    assert_eq!(a.acquire(1), vec![TriggerKey::named("t1")]);
    assert_eq!(b.acquire(1), vec![TriggerKey::named("t2")]);

    // Node a crashes and comes back under the same instance id
    drop(a);
    let a = Node::join(&grid, "node-a");
    a.store.scheduler_started().unwrap();

    assert_eq!(a.state("t1"), TriggerState::Normal);
    assert_eq!(a.state("t2"), TriggerState::Acquired);
    assert_eq!(a.acquire(10), vec![TriggerKey::named("t1")]);
}

#[test]
fn restarted_node_unblocks_jobs_it_was_running() {
    let grid = Arc::new(MemoryGrid::new("cluster"));
    let a = Node::join(&grid, "node-a");
    a.store
        .store_job(job("j").disallow_concurrent_execution(), false)
        .unwrap();
    a.store
        .store_trigger(trigger("t1", "j", every_minute(), T0), false)
        .unwrap();
    a.store
        .store_trigger(trigger("t2", "j", every_minute(), T0 + 30_000), false)
        .unwrap();
    let acquired = a
        .store
        .acquire_next_triggers(at(T0), 10, Duration::ZERO)
        .unwrap();
    a.store.triggers_fired(&acquired).unwrap();
    assert_eq!(a.state("t2"), TriggerState::Blocked);

    drop(a);
    let a = Node::join(&grid, "node-a");
    a.store.scheduler_started().unwrap();

    assert_eq!(a.state("t2"), TriggerState::Normal);
    assert!(a
        .signals
        .calls()
        .contains(&Signal::SchedulingChange(None)));
}
