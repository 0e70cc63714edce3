// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background snapshot writer.
//!
//! Mutators publish the latest table through a watch channel and return
//! immediately. The writer task only ever sees the newest value, so a burst of
//! mutations costs one write. Write failures are logged; the in-memory table
//! stays authoritative.

use crate::snapshot::SnapshotFile;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cheap, cloneable handle used by the owning repository to publish state.
#[derive(Debug)]
pub struct CheckpointHandle<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> Clone for CheckpointHandle<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> CheckpointHandle<T> {
    /// Queue `state` for writing, replacing anything not yet written.
    pub fn publish(&self, state: T) {
        self.tx.send_replace(Some(state));
    }
}

/// Owns the writer task for one snapshot file.
pub struct Checkpointer;

impl Checkpointer {
    /// Spawn the writer for `file`. It exits when `cancel` fires or every
    /// handle is dropped, writing any pending state first.
    pub fn spawn<T>(file: SnapshotFile, cancel: CancellationToken) -> (CheckpointHandle<T>, JoinHandle<()>)
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let (tx, mut rx) = watch::channel::<Option<T>>(None);
        let task = tokio::spawn(async move {
            loop {
                let stop = tokio::select! {
                    changed = rx.changed() => changed.is_err(),
                    _ = cancel.cancelled() => true,
                };
                let pending = rx.borrow_and_update().clone();
                if let Some(state) = pending {
                    write(&file, state).await;
                }
                if stop {
                    break;
                }
            }
            debug!(path = %file.path().display(), "checkpointer stopped");
        });
        (CheckpointHandle { tx }, task)
    }
}

async fn write<T>(file: &SnapshotFile, state: T)
where
    T: Serialize + Send + 'static,
{
    let file = file.clone();
    let path = file.path().to_path_buf();
    match tokio::task::spawn_blocking(move || file.save(&state)).await {
        Ok(Ok(result)) => {
            debug!(path = %path.display(), size_bytes = result.size_bytes, "snapshot written")
        }
        Ok(Err(e)) => warn!(path = %path.display(), error = %e, "snapshot write failed"),
        Err(e) => warn!(path = %path.display(), error = %e, "snapshot writer panicked"),
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
