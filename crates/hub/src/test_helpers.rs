// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for hub unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bh_core::test_support::registration;
use bh_core::{AgentId, FakeClock, Registration};
use bh_wire::{Envelope, Message, MessageType};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::channel::{publish_registry_events, Router};
use crate::ctx::HubCtx;
use crate::ledger::TaskLedger;
use crate::observer::Subscription;
use crate::registry::AgentRegistry;
use crate::sink::{ChannelError, CommandSink};

/// Command sink that records traffic instead of writing to sockets.
#[derive(Default)]
pub(crate) struct RecordingSink {
    connected: Mutex<HashSet<AgentId>>,
    pub sent: Mutex<Vec<(AgentId, Message)>>,
    pub broadcasts: Mutex<Vec<Message>>,
}

impl RecordingSink {
    pub fn connect(&self, agent_id: &AgentId) {
        self.connected.lock().insert(agent_id.clone());
    }

    pub fn disconnect(&self, agent_id: &AgentId) {
        self.connected.lock().remove(agent_id);
    }

    pub fn sent_kinds(&self) -> Vec<MessageType> {
        self.sent.lock().iter().map(|(_, m)| m.kind()).collect()
    }

    pub fn broadcast_kinds(&self) -> Vec<MessageType> {
        self.broadcasts.lock().iter().map(Message::kind).collect()
    }
}

impl CommandSink for RecordingSink {
    fn send_to_agent(&self, agent_id: &AgentId, message: Message) -> Result<(), ChannelError> {
        if !self.connected.lock().contains(agent_id) {
            return Err(ChannelError::AgentNotConnected(agent_id.clone()));
        }
        self.sent.lock().push((agent_id.clone(), message));
        Ok(())
    }

    fn broadcast(&self, message: Message) {
        self.broadcasts.lock().push(message);
    }
}

/// Registry + ledger wired to a recording sink and a fake clock.
pub(crate) struct Fixture {
    pub clock: FakeClock,
    pub registry: Arc<AgentRegistry<FakeClock>>,
    pub ledger: Arc<TaskLedger<FakeClock>>,
    pub sink: Arc<RecordingSink>,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = FakeClock::new();
        let registry = Arc::new(AgentRegistry::new(clock.clone(), 1));
        let sink = Arc::new(RecordingSink::default());
        let ledger = Arc::new(TaskLedger::new(clock.clone(), Arc::clone(&registry), sink.clone()));
        Self { clock, registry, ledger, sink }
    }

    /// Register a connected agent with `max` slots.
    pub fn agent(&self, name: &str, max: u32) -> AgentId {
        self.agent_with(Registration { max_concurrency: Some(max), ..registration(name, "10.0.0.1") })
    }

    pub fn agent_with(&self, reg: Registration) -> AgentId {
        let id = self.registry.register(&reg).id;
        self.sink.connect(&id);
        id
    }
}

/// Full hub context routed through a real [`Router`], without sockets.
pub(crate) struct CtxFixture {
    pub clock: FakeClock,
    pub ctx: Arc<HubCtx<FakeClock>>,
    _registry_events: Subscription,
}

impl CtxFixture {
    pub fn new() -> Self {
        let clock = FakeClock::new();
        let registry = Arc::new(AgentRegistry::new(clock.clone(), 1));
        let router = Arc::new(Router::new(clock.clone(), 64));
        let ledger = Arc::new(TaskLedger::new(clock.clone(), Arc::clone(&registry), router.clone()));
        let registry_events = publish_registry_events(&registry, Arc::clone(&router));
        let ctx = Arc::new(HubCtx {
            clock: clock.clone(),
            registry,
            ledger,
            router,
            heartbeat_timeout: Duration::from_secs(90),
            ipc_timeout: Duration::from_secs(5),
        });
        Self { clock, ctx, _registry_events: registry_events }
    }

    /// Register an agent with `max` slots and attach its channel queue.
    pub fn agent(&self, name: &str, max: u32) -> (AgentId, mpsc::Receiver<Envelope>) {
        let reg = Registration { max_concurrency: Some(max), ..registration(name, "10.0.0.1") };
        let id = self.ctx.registry.register(&reg).id;
        let (_, rx) = self.ctx.router.attach_agent(id.clone());
        (id, rx)
    }

    /// Attach an observer queue; its first message is the snapshot.
    pub fn observer(&self) -> mpsc::Receiver<Envelope> {
        let ctx = Arc::clone(&self.ctx);
        self.ctx.router.attach_observer(move || ctx.snapshot()).1
    }
}

/// Everything queued so far.
pub(crate) fn drain(rx: &mut mpsc::Receiver<Envelope>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        out.push(envelope);
    }
    out
}

pub(crate) fn kinds(envelopes: &[Envelope]) -> Vec<MessageType> {
    envelopes.iter().map(Envelope::kind).collect()
}
