// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of grid commits
//!
//! One JSON line per commit, holding every operation the commit applied.
//! A crash mid-append leaves at most one unterminated line at the end of
//! the file; it is discarded on open, so a commit is either replayed whole
//! or not at all.

use cj_core::Operation;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt WAL entry at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct WalEntry {
    seq: u64,
    ops: Vec<Operation>,
}

/// Complete entries of a log file and the length of the bytes holding them
struct Scan {
    entries: Vec<WalEntry>,
    valid_len: u64,
    torn: bool,
}

/// Append-only log of committed operation batches
pub struct Wal {
    file: File,
    sequence: u64,
    entries: u64,
}

impl Wal {
    /// Open or create a WAL at the given path
    ///
    /// `floor` is the last sequence already folded into a snapshot: entries at
    /// or below it are not counted as pending, and numbering never goes back
    /// below it even when the log is empty.
    pub fn open(path: &Path, floor: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let scan = scan(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if scan.torn {
            tracing::warn!(
                path = %path.display(),
                valid_len = scan.valid_len,
                "discarding torn WAL tail"
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        let sequence = scan
            .entries
            .last()
            .map_or(floor, |entry| entry.seq.max(floor));
        let entries = scan.entries.iter().filter(|entry| entry.seq > floor).count() as u64;
        Ok(Self {
            file,
            sequence,
            entries,
        })
    }

    /// Append one commit, syncing before returning its sequence number
    pub fn append(&mut self, ops: &[Operation]) -> Result<u64, WalError> {
        let entry = WalEntry {
            seq: self.sequence + 1,
            ops: ops.to_vec(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_all()?;
        self.sequence = entry.seq;
        self.entries += 1;
        Ok(self.sequence)
    }

    /// Sequence number of the last commit
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Commits in the log that no snapshot covers yet
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Drop every entry once a snapshot covers them; numbering continues
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.entries = 0;
        Ok(())
    }

    /// Operations of every complete commit after sequence `after`
    pub fn replay(path: &Path, after: u64) -> Result<Vec<Operation>, WalError> {
        Ok(scan(path)?
            .entries
            .into_iter()
            .filter(|entry| entry.seq > after)
            .flat_map(|entry| entry.ops)
            .collect())
    }
}

fn scan(path: &Path) -> Result<Scan, WalError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    let mut offset = 0;
    let mut line = 0;
    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let Some(end) = rest.iter().position(|&b| b == b'\n') else {
            return Ok(Scan {
                entries,
                valid_len: offset as u64,
                torn: true,
            });
        };
        line += 1;
        let text = &rest[..end];
        if !text.is_empty() {
            let entry = serde_json::from_slice(text)
                .map_err(|source| WalError::Json { line, source })?;
            entries.push(entry);
        }
        offset += end + 1;
    }

    Ok(Scan {
        entries,
        valid_len: offset as u64,
        torn: false,
    })
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
