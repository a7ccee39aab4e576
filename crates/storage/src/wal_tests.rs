// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cj_core::{JobDetail, JobKey};

fn store_job(name: &str) -> Operation {
    Operation::JobStore {
        job: JobDetail::new(JobKey::named(name)),
    }
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count()
}

#[test]
fn commit_is_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&[
            store_job("j1"),
            Operation::TriggerGroupPause {
                group: "reports".to_string(),
            },
        ])
        .unwrap();
        wal.append(&[store_job("j2")]).unwrap();
    }

    assert_eq!(line_count(&path), 2);
    let ops = Wal::replay(&path, 0).unwrap();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0], store_job("j1"));
    assert!(matches!(ops[1], Operation::TriggerGroupPause { .. }));
    assert_eq!(ops[2], store_job("j2"));
}

#[test]
fn sequence_continues_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.sequence(), 0);
        assert_eq!(wal.append(&[Operation::ClearAll]).unwrap(), 1);
    }

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.sequence(), 1);
    assert_eq!(wal.entries(), 1);
}

#[test]
fn truncate_keeps_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&[store_job("j1")]).unwrap();
    wal.append(&[store_job("j2")]).unwrap();
    wal.truncate().unwrap();

    assert_eq!(wal.entries(), 0);
    assert_eq!(line_count(&path), 0);
    assert_eq!(wal.append(&[store_job("j3")]).unwrap(), 3);
    assert_eq!(Wal::replay(&path, 2).unwrap(), vec![store_job("j3")]);
}

#[test]
fn empty_log_starts_at_the_snapshot_floor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 41).unwrap();
    assert_eq!(wal.sequence(), 41);
    assert_eq!(wal.entries(), 0);
    assert_eq!(wal.append(&[Operation::ClearAll]).unwrap(), 42);
}

#[test]
fn entries_folded_into_a_snapshot_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&[store_job("j1")]).unwrap();
        wal.append(&[store_job("j2")]).unwrap();
    }

    // Crash after the snapshot was written but before the log was truncated
    let wal = Wal::open(&path, 1).unwrap();
    assert_eq!(wal.entries(), 1);
    assert_eq!(Wal::replay(&path, 1).unwrap(), vec![store_job("j2")]);
}

#[test]
fn open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("grid.wal");
    Wal::open(&path, 0).unwrap();
    assert!(path.exists());
}

#[test]
fn replay_nonexistent() {
    let path = Path::new("/nonexistent/path/wal");
    let ops = Wal::replay(path, 0).unwrap();
    assert!(ops.is_empty());
}

#[test]
fn torn_tail_is_discarded_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&[store_job("j1")]).unwrap();
    }
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(br#"{"seq":2,"ops":[{"JobSto"#).unwrap();
    drop(file);

    assert_eq!(Wal::replay(&path, 0).unwrap(), vec![store_job("j1")]);

    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.sequence(), 1);
    wal.append(&[store_job("j2")]).unwrap();
    assert_eq!(
        Wal::replay(&path, 0).unwrap(),
        vec![store_job("j1"), store_job("j2")]
    );
}

#[test]
fn corrupt_complete_line_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&[Operation::ClearAll]).unwrap();
    }
    fs::write(
        &path,
        format!("{}\nnot json\n", fs::read_to_string(&path).unwrap().trim_end()),
    )
    .unwrap();

    let err = Wal::replay(&path, 0).unwrap_err();
    assert!(matches!(err, WalError::Json { line: 2, .. }));
    assert!(Wal::open(&path, 0).is_err());
}
