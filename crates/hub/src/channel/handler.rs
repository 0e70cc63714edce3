// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound control-channel messages from a connected agent.

use bh_core::{AgentId, Clock, LoadReport};
use bh_wire::{Envelope, HeartbeatAckPayload, Message, StatusPayload};
use tracing::{debug, warn};

use crate::ctx::HubCtx;
use crate::sink::CommandSink;

/// Apply one message received from `agent_id`.
///
/// Accepted task events are relayed to observers verbatim; anything the
/// ledger rejects stops here.
pub fn handle_agent_message<C: Clock>(ctx: &HubCtx<C>, agent_id: &AgentId, envelope: Envelope) {
    match &envelope.message {
        Message::StatusUpdate(status) => handle_status(ctx, agent_id, status),
        Message::TaskProgress(_)
        | Message::TaskLog(_)
        | Message::TaskCompleted(_)
        | Message::TaskFailed(_) => match ctx.ledger.apply_agent_event(agent_id, &envelope.message) {
            Ok(_) => ctx.router.relay(envelope),
            Err(e) => warn!(agent_id = %agent_id, kind = %envelope.kind(), error = %e, "task event rejected"),
        },
        _ => warn!(agent_id = %agent_id, kind = %envelope.kind(), "unexpected message from agent"),
    }
}

fn handle_status<C: Clock>(ctx: &HubCtx<C>, agent_id: &AgentId, status: &StatusPayload) {
    if &status.agent_id != agent_id {
        warn!(agent_id = %agent_id, claimed = %status.agent_id, "status update for another agent ignored");
        return;
    }
    let report = LoadReport {
        status: status.status,
        cpu_usage_pct: status.cpu_usage_pct,
        mem_usage_pct: status.mem_usage_pct,
        current_task_id: status.current_task_id.clone(),
    };
    match ctx.heartbeat(agent_id, &report) {
        Ok(outcome) => {
            let ack = Message::HeartbeatAck(HeartbeatAckPayload {
                agent_id: agent_id.clone(),
                status: outcome.record.status,
            });
            if let Err(e) = ctx.router.send_to_agent(agent_id, ack) {
                debug!(agent_id = %agent_id, error = %e, "heartbeat ack not sent");
            }
        }
        Err(e) => warn!(agent_id = %agent_id, error = %e, "status update rejected"),
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
