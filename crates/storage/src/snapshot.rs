// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot files for crash recovery.
//!
//! On disk a snapshot is zstd-compressed JSON of [`Snapshot`]. Plain JSON is
//! accepted on load so files can be hand-edited or produced by older builds.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current snapshot schema version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const ZSTD_LEVEL: i32 = 3;
const MAX_BAK_FILES: u32 = 3;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected <= {CURRENT_SNAPSHOT_VERSION})")]
    Version { found: u32 },
}

/// A table at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// Schema version
    #[serde(rename = "v")]
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub state: T,
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveResult {
    pub size_bytes: u64,
}

/// One snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the latest snapshot, falling back to the newest `.bak` when the
    /// primary file is missing (crash between rotate and rename).
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<Snapshot<T>>, SnapshotError> {
        let source = if self.path.exists() {
            self.path.clone()
        } else if bak_path(&self.path, 1).exists() {
            tracing::warn!(path = %self.path.display(), "snapshot missing, recovering from backup");
            bak_path(&self.path, 1)
        } else {
            return Ok(None);
        };

        let raw = fs::read(&source)?;
        let json = if raw.starts_with(&ZSTD_MAGIC) { zstd::decode_all(&raw[..])? } else { raw };
        let snapshot: Snapshot<T> = serde_json::from_slice(&json)?;
        if snapshot.version > CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::Version { found: snapshot.version });
        }
        Ok(Some(snapshot))
    }

    /// Write `state` as the new snapshot.
    ///
    /// The data is fully written and synced to a temp file before the rename,
    /// so readers see either the old or the new snapshot, never a torn one.
    pub fn save<T: Serialize>(&self, state: &T) -> Result<SaveResult, SnapshotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let snapshot = SnapshotRef { version: CURRENT_SNAPSHOT_VERSION, created_at: Utc::now(), state };
        let json = serde_json::to_vec(&snapshot)?;
        let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }

        if self.path.exists() {
            fs::rename(&self.path, rotate_bak_path(&self.path))?;
        }
        fs::rename(&tmp, &self.path)?;

        Ok(SaveResult { size_bytes: compressed.len() as u64 })
    }
}

/// Borrowing twin of [`Snapshot`] so saving does not clone the table.
#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    #[serde(rename = "v")]
    version: u32,
    created_at: DateTime<Utc>,
    state: &'a T,
}

fn bak_path(path: &Path, n: u32) -> PathBuf {
    if n == 1 {
        path.with_extension("bak")
    } else {
        path.with_extension(format!("bak.{n}"))
    }
}

/// Free the `.bak` slot by shifting older backups up, dropping the oldest.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let oldest = bak_path(path, MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak_path(path, n);
        if src.exists() {
            let _ = fs::rename(&src, bak_path(path, n + 1));
        }
    }
    bak_path(path, 1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
