// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bh watch`: follow the hub's observer stream.

use std::collections::HashMap;

use anyhow::{Context, Result};
use bh_core::AgentId;
use bh_wire::{Envelope, Message};
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::color;
use crate::output::OutputFormat;

pub const DEFAULT_CHANNEL_PORT: u16 = 7421;

/// Observer URL: an explicit `host:port`, else the hub's host on the
/// default channel port.
pub fn channel_url(hub: &str, channel: Option<&str>) -> String {
    match channel {
        Some(addr) => format!("ws://{addr}/"),
        None => {
            let host = hub.rsplit_once(':').map_or(hub, |(host, _)| host);
            format!("ws://{host}:{DEFAULT_CHANNEL_PORT}/")
        }
    }
}

/// Print one line per envelope until the hub closes the stream or Ctrl-C.
pub async fn watch(url: &str, format: OutputFormat) -> Result<()> {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("cannot connect to control channel at {url}"))?;
    let (_sink, mut stream) = ws.split();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut revisions = Revisions::default();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match Envelope::from_json(&text) {
                    Ok(envelope) if !revisions.admit(&envelope.message) => {}
                    Ok(envelope) => match format {
                        OutputFormat::Json => println!("{}", text.as_str()),
                        OutputFormat::Text => println!("{}", describe(&envelope)),
                    },
                    Err(e) => eprintln!("warning: unreadable message: {e}"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    eprintln!("hub closed the stream");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("control channel error"),
            },
        }
    }
    Ok(())
}

/// Last applied revision per agent. Agent messages can arrive out of order,
/// so anything older than what was already shown is stale.
#[derive(Debug, Default)]
pub struct Revisions {
    latest: HashMap<AgentId, u64>,
}

impl Revisions {
    /// Record `message` and return whether it is newer than what was seen.
    pub fn admit(&mut self, message: &Message) -> bool {
        if let Message::Snapshot(snapshot) = message {
            for agent in &snapshot.agents {
                self.latest.insert(agent.id.clone(), agent.revision);
            }
            return true;
        }
        let Some((agent_id, revision)) = message.agent_revision() else {
            return true;
        };
        match self.latest.get(agent_id) {
            Some(&seen) if seen >= revision => false,
            _ => {
                self.latest.insert(agent_id.clone(), revision);
                true
            }
        }
    }
}

fn clock(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// One human-readable line for an envelope.
pub fn describe(envelope: &Envelope) -> String {
    let detail = match &envelope.message {
        Message::AgentRegistered(p) => {
            format!("{} {} at {} ({})", p.agent.name, color::muted(p.agent.id.as_str()), p.agent.host, p.agent.status)
        }
        Message::StatusUpdate(p) => {
            format!("{} {} tasks={}", p.agent_id, color::status(&p.status.to_string()), p.active_task_ids.len())
        }
        Message::Offline(p) if p.released_task_ids.is_empty() => format!("{} {}", p.agent_id, p.reason),
        Message::Offline(p) => {
            format!("{} {} released={}", p.agent_id, p.reason, p.released_task_ids.len())
        }
        Message::TaskAssigned(p) => format!("{} {} -> {}", p.task_id, p.job_ref, p.agent_id),
        Message::TaskProgress(p) => match &p.stage {
            Some(stage) => format!("{} {}% {stage}", p.task_id, p.progress_pct),
            None => format!("{} {}%", p.task_id, p.progress_pct),
        },
        Message::TaskLog(p) => format!("{} [{:?}] {}", p.task_id, p.level, p.line),
        Message::TaskCompleted(p) => match &p.result_ref {
            Some(result) => format!("{} exit={} {result}", p.task_id, p.exit_code),
            None => format!("{} exit={}", p.task_id, p.exit_code),
        },
        Message::TaskFailed(p) => format!("{} {}", p.task_id, p.error_message),
        Message::TaskCancelled(p) => match &p.reason {
            Some(reason) => format!("{} {reason}", p.task_id),
            None => p.task_id.to_string(),
        },
        Message::HeartbeatAck(p) => format!("{} {}", p.agent_id, p.status),
        Message::Snapshot(p) => format!("{} agents, {} active tasks", p.agents.len(), p.tasks.len()),
    };
    let kind = format!("{:<16}", envelope.kind().to_string());
    format!("{} {} {}", clock(envelope.timestamp), color::header(&kind), detail)
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
