// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cj_core::{JobDetail, JobKey};
use std::sync::Arc;
use std::thread;

fn store_job(name: &str) -> Operation {
    Operation::JobStore {
        job: JobDetail::new(JobKey::named(name)),
    }
}

fn job_names(grid: &MemoryGrid) -> Vec<String> {
    let guard = grid.lock("check").unwrap();
    let mut names: Vec<String> = guard.state().jobs().map(|j| j.key.name.clone()).collect();
    names.sort();
    names
}

#[test]
fn apply_through_guard_updates_state() {
    let grid = MemoryGrid::new("test");
    {
        let mut guard = grid.lock("node-a").unwrap();
        guard.apply(store_job("j")).unwrap();
        assert!(guard.state().job(&JobKey::named("j")).is_some());
        assert_eq!(guard.pending(), 1);
        guard.commit().unwrap();
    }
    assert!(!grid.is_durable());
    assert_eq!(grid.lock("node-b").unwrap().state().job_count(), 1);
}

#[test]
fn read_only_guard_needs_no_commit() {
    let grid = MemoryGrid::new("test");
    drop(grid.lock("node-a").unwrap());
    assert!(grid.is_available());
}

#[test]
fn shutdown_makes_lock_unavailable() {
    let grid = MemoryGrid::new("test");
    grid.shutdown();
    assert!(matches!(grid.lock("node-a"), Err(GridError::Unavailable(name)) if name == "test"));
}

#[test]
fn shutdown_while_held_rejects_further_writes() {
    let grid = MemoryGrid::new("test");
    let mut guard = grid.lock("node-a").unwrap();
    grid.shutdown();
    assert!(matches!(
        guard.apply(store_job("j")),
        Err(GridError::Unavailable(_))
    ));
    assert_eq!(guard.state().job_count(), 0);
}

#[test]
fn dropping_uncommitted_writes_takes_grid_offline() {
    let grid = MemoryGrid::new("test");
    {
        let mut guard = grid.lock("node-a").unwrap();
        guard.apply(store_job("j")).unwrap();
    }
    assert!(!grid.is_available());
    assert!(matches!(grid.lock("node-b"), Err(GridError::Unavailable(_))));
}

#[test]
fn lock_is_mutually_exclusive_across_threads() {
    let grid = Arc::new(MemoryGrid::new("test"));
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let grid = Arc::clone(&grid);
            thread::spawn(move || {
                for i in 0..25 {
                    let mut guard = grid.lock(&format!("node-{n}")).unwrap();
                    // Read-modify-write under the lock must never interleave
                    let before = guard.state().job_count();
                    guard.apply(store_job(&format!("{n}-{i}"))).unwrap();
                    assert_eq!(guard.state().job_count(), before + 1);
                    guard.commit().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(grid.lock("check").unwrap().state().job_count(), 100);
}

#[test]
fn poisoned_lock_is_surfaced() {
    let grid = Arc::new(MemoryGrid::new("test"));
    let poisoner = Arc::clone(&grid);
    let result = thread::spawn(move || {
        let _guard = poisoner.lock("node-a").unwrap();
        panic!("holder died");
    })
    .join();
    assert!(result.is_err());
    assert!(matches!(grid.lock("node-b"), Err(GridError::Poisoned(_))));
}

#[test]
fn durable_grid_recovers_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.wal");

    {
        let grid = MemoryGrid::open("test", &path).unwrap();
        assert!(grid.is_durable());
        let mut guard = grid.lock("node-a").unwrap();
        guard.apply(store_job("j1")).unwrap();
        guard.apply(store_job("j2")).unwrap();
        guard
            .apply(Operation::JobRemove {
                key: JobKey::named("j1"),
            })
            .unwrap();
        guard.commit().unwrap();
    }

    let grid = MemoryGrid::open("test", &path).unwrap();
    assert_eq!(job_names(&grid), vec!["j2"]);
}

#[test]
fn commit_refused_after_shutdown_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.wal");

    {
        let grid = MemoryGrid::open("test", &path).unwrap();
        let mut guard = grid.lock("node-a").unwrap();
        guard.apply(store_job("kept")).unwrap();
        guard.commit().unwrap();

        let mut guard = grid.lock("node-a").unwrap();
        guard.apply(store_job("a")).unwrap();
        guard.apply(store_job("b")).unwrap();
        grid.shutdown();
        assert!(matches!(guard.commit(), Err(GridError::Unavailable(_))));
    }

    let grid = MemoryGrid::open("test", &path).unwrap();
    assert_eq!(job_names(&grid), vec!["kept"]);
}

#[test]
fn open_folds_the_log_into_a_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.wal");

    {
        let grid = MemoryGrid::open("test", &path).unwrap();
        for name in ["j1", "j2", "j3"] {
            let mut guard = grid.lock("node-a").unwrap();
            guard.apply(store_job(name)).unwrap();
            guard.commit().unwrap();
        }
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);

    let grid = MemoryGrid::open("test", &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    let snapshot = GridSnapshot::load(&snapshot_path(&path)).unwrap().unwrap();
    assert_eq!(snapshot.sequence, 3);
    assert_eq!(job_names(&grid), vec!["j1", "j2", "j3"]);

    // Numbering continues after the snapshot
    let mut guard = grid.lock("node-a").unwrap();
    guard.apply(store_job("j4")).unwrap();
    guard.commit().unwrap();
    drop(grid);
    assert_eq!(
        job_names(&MemoryGrid::open("test", &path).unwrap()),
        vec!["j1", "j2", "j3", "j4"]
    );
}

#[test]
fn log_is_compacted_once_it_reaches_the_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.wal");

    let grid = MemoryGrid::open_with("test", &path, 2).unwrap();
    for name in ["j1", "j2", "j3"] {
        let mut guard = grid.lock("node-a").unwrap();
        guard.apply(store_job(name)).unwrap();
        guard
            .apply(Operation::JobRemove {
                key: JobKey::named(name),
            })
            .unwrap();
        guard.apply(store_job(name)).unwrap();
        guard.commit().unwrap();
    }

    // Two commits were folded; only the third is still in the log
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    let snapshot = GridSnapshot::load(&snapshot_path(&path)).unwrap().unwrap();
    assert_eq!(snapshot.sequence, 2);
    assert_eq!(snapshot.jobs.len(), 2);
    drop(grid);

    let grid = MemoryGrid::open("test", &path).unwrap();
    assert_eq!(job_names(&grid), vec!["j1", "j2", "j3"]);
}
