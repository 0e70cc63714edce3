// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection tables for the control channel.
//!
//! Each live socket owns a bounded outbound queue drained by its writer
//! task. Enqueueing never waits on the network, so hub state can be mutated
//! and published without holding a socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bh_core::{AgentId, Clock};
use bh_wire::{Envelope, Message, SnapshotPayload};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::sink::{ChannelError, CommandSink};

/// Default per-connection outbound queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct AgentConn {
    generation: u64,
    tx: mpsc::Sender<Envelope>,
}

pub struct Router<C: Clock> {
    clock: C,
    queue_capacity: usize,
    next_generation: AtomicU64,
    agents: Mutex<HashMap<AgentId, AgentConn>>,
    observers: Mutex<HashMap<String, mpsc::Sender<Envelope>>>,
}

impl<C: Clock> Router<C> {
    pub fn new(clock: C, queue_capacity: usize) -> Self {
        Self {
            clock,
            queue_capacity: queue_capacity.max(1),
            next_generation: AtomicU64::new(1),
            agents: Mutex::new(HashMap::new()),
            observers: Mutex::new(HashMap::new()),
        }
    }

    /// Bind a socket to an agent, replacing (and closing) any previous one.
    ///
    /// The returned generation identifies this connection for [`Self::detach_agent`].
    pub fn attach_agent(&self, agent_id: AgentId) -> (u64, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.agents.lock().insert(agent_id.clone(), AgentConn { generation, tx });
        if previous.is_some() {
            info!(agent_id = %agent_id, "agent connection replaced");
        }
        (generation, rx)
    }

    /// Drop the binding if it still belongs to `generation`.
    ///
    /// Returns false when a newer connection has taken over.
    pub fn detach_agent(&self, agent_id: &AgentId, generation: u64) -> bool {
        let mut agents = self.agents.lock();
        match agents.get(agent_id) {
            Some(conn) if conn.generation == generation => {
                agents.remove(agent_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_connected(&self, agent_id: &AgentId) -> bool {
        self.agents.lock().contains_key(agent_id)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.lock().len()
    }

    /// Register an observer whose queue starts with `snapshot()`.
    ///
    /// The snapshot is taken under the observer lock, so nothing broadcast
    /// afterwards can be queued ahead of it.
    pub fn attach_observer<F>(&self, snapshot: F) -> (String, mpsc::Receiver<Envelope>)
    where
        F: FnOnce() -> SnapshotPayload,
    {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = format!("obs-{}", nanoid::nanoid!(8));
        let mut observers = self.observers.lock();
        let first = self.envelope(Message::Snapshot(snapshot()));
        // Fresh queue with capacity >= 1
        let _ = tx.try_send(first);
        observers.insert(id.clone(), tx);
        debug!(observer = %id, "observer attached");
        (id, rx)
    }

    pub fn detach_observer(&self, observer_id: &str) {
        if self.observers.lock().remove(observer_id).is_some() {
            debug!(observer = %observer_id, "observer detached");
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Forward an agent-originated envelope to observers untouched.
    pub fn relay(&self, envelope: Envelope) {
        let mut observers = self.observers.lock();
        observers.retain(|id, tx| match tx.try_send(envelope.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(observer = %id, kind = %envelope.kind(), "observer queue full, message dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Close every connection by dropping its queue.
    pub fn close_all(&self) {
        self.agents.lock().clear();
        self.observers.lock().clear();
    }

    fn envelope(&self, message: Message) -> Envelope {
        Envelope::new(message, self.clock.epoch_ms())
    }
}

impl<C: Clock> CommandSink for Router<C> {
    fn send_to_agent(&self, agent_id: &AgentId, message: Message) -> Result<(), ChannelError> {
        let kind = message.kind();
        let envelope = self.envelope(message);
        let agents = self.agents.lock();
        let Some(conn) = agents.get(agent_id) else {
            warn!(agent_id = %agent_id, %kind, "command dropped: agent not connected");
            return Err(ChannelError::AgentNotConnected(agent_id.clone()));
        };
        conn.tx.try_send(envelope).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "outbound queue full",
                TrySendError::Closed(_) => "connection closing",
            };
            warn!(agent_id = %agent_id, %kind, reason, "command dropped");
            ChannelError::SendFailed { agent_id: agent_id.clone(), reason: reason.to_string() }
        })
    }

    fn broadcast(&self, message: Message) {
        self.relay(self.envelope(message));
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
