// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared hub context for the RPC listener, the control channel and the
//! sweeper.
//!
//! Flows that touch both tables live here so the registry and the ledger
//! stay ignorant of each other's side effects.

use std::sync::Arc;
use std::time::Duration;

use bh_core::{AgentId, AgentRecord, Clock, LoadReport};
use bh_wire::SnapshotPayload;
use tracing::info;

use crate::channel::Router;
use crate::ledger::TaskLedger;
use crate::registry::{AgentRegistry, Expired, HeartbeatOutcome, OfflineReason, RegistryError};

const DEREGISTERED: &str = "agent deregistered";

pub struct HubCtx<C: Clock> {
    pub clock: C,
    pub registry: Arc<AgentRegistry<C>>,
    pub ledger: Arc<TaskLedger<C>>,
    pub router: Arc<Router<C>>,
    pub heartbeat_timeout: Duration,
    pub ipc_timeout: Duration,
}

impl<C: Clock> HubCtx<C> {
    /// Heartbeat, failing any tasks released by a self-reported shutdown.
    pub fn heartbeat(&self, agent_id: &AgentId, report: &LoadReport) -> Result<HeartbeatOutcome, RegistryError> {
        let outcome = self.registry.heartbeat(agent_id, report)?;
        if !outcome.released.is_empty() {
            self.ledger.fail_tasks(&outcome.released, OfflineReason::ShuttingDown.task_error());
        }
        Ok(outcome)
    }

    /// Remove an agent and fail whatever it still held.
    pub fn deregister(&self, agent_id: &AgentId) -> Result<AgentRecord, RegistryError> {
        let record = self.registry.deregister(agent_id)?;
        if !record.active_task_ids.is_empty() {
            self.ledger.fail_tasks(&record.active_task_ids, DEREGISTERED);
        }
        Ok(record)
    }

    /// The agent's live connection closed: offline now, tasks failed.
    pub fn agent_disconnected(&self, agent_id: &AgentId) {
        match self.registry.mark_offline(agent_id, OfflineReason::Disconnected) {
            Ok(released) if !released.is_empty() => {
                self.ledger.fail_tasks(&released, OfflineReason::Disconnected.task_error());
            }
            Ok(_) => {}
            // Deregistered while connected
            Err(RegistryError::AgentNotFound(_)) => {}
            Err(e) => info!(agent_id = %agent_id, error = %e, "disconnect not recorded"),
        }
    }

    /// One liveness pass at the current time.
    pub fn sweep(&self) -> Vec<Expired> {
        let expired = self.registry.sweep_expired(self.clock.epoch_ms(), self.heartbeat_timeout);
        for agent in &expired {
            if !agent.released.is_empty() {
                self.ledger.fail_tasks(&agent.released, OfflineReason::HeartbeatTimeout.task_error());
            }
        }
        expired
    }

    /// Full state for a newly connected observer.
    pub fn snapshot(&self) -> SnapshotPayload {
        SnapshotPayload { agents: self.registry.list(), tasks: self.ledger.list_active() }
    }
}

#[cfg(test)]
#[path = "ctx_tests.rs"]
mod tests;
