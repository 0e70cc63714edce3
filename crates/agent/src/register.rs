// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use bh_core::{AgentId, Registration};
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, HubClient};

/// Register with the hub, sleeping `backoff` between failed attempts.
///
/// Gives up after `max_attempts` failures (never when `None`) and returns the
/// last error. Returns `Ok(None)` if cancelled while waiting.
pub async fn register_with_retry(
    client: &HubClient,
    registration: &Registration,
    backoff: Duration,
    max_attempts: Option<u32>,
    cancel: &CancellationToken,
) -> Result<Option<AgentId>, ClientError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match client.register(registration).await {
            Ok(agent_id) => {
                tracing::info!(agent_id = %agent_id, attempt, "registered with hub");
                return Ok(Some(agent_id));
            }
            Err(e) if max_attempts.is_some_and(|max| attempt >= max) => {
                tracing::error!(error = %e, attempt, "registration failed, giving up");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, retry_in = ?backoff, "registration failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

#[cfg(test)]
#[path = "register_tests.rs"]
mod tests;
