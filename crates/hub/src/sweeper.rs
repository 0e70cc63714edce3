// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic liveness sweep.

use std::sync::Arc;
use std::time::Duration;

use bh_core::Clock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ctx::HubCtx;

/// Mark agents offline once their heartbeat is older than the timeout.
///
/// Runs every `interval` until cancelled.
pub async fn run<C: Clock>(ctx: Arc<HubCtx<C>>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let expired = ctx.sweep();
                if !expired.is_empty() {
                    let released: usize = expired.iter().map(|e| e.released.len()).sum();
                    info!(agents = expired.len(), released, "liveness sweep");
                }
            }
        }
    }
    debug!("sweeper stopped");
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
