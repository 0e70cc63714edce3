// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable snapshots for the hub's in-memory tables.
//!
//! Each table owns one snapshot file. Writes replace the file atomically and
//! keep rotated `.bak` copies; a background [`Checkpointer`] coalesces bursts
//! of mutations into single writes.

mod checkpoint;
mod snapshot;

pub use checkpoint::{CheckpointHandle, Checkpointer};
pub use snapshot::{SaveResult, Snapshot, SnapshotError, SnapshotFile, CURRENT_SNAPSHOT_VERSION};
