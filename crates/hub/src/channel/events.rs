// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry changes as observer messages.

use std::sync::Arc;

use bh_core::Clock;
use bh_wire::{AgentRegisteredPayload, Message, OfflinePayload, StatusPayload};

use super::Router;
use crate::observer::Subscription;
use crate::registry::{AgentRegistry, RegistryEvent};
use crate::sink::CommandSink;

pub fn registry_message(event: &RegistryEvent) -> Message {
    match event {
        RegistryEvent::Registered(record) => {
            Message::AgentRegistered(AgentRegisteredPayload { agent: record.clone() })
        }
        RegistryEvent::Updated(record) => Message::StatusUpdate(StatusPayload::from_record(record)),
        RegistryEvent::Reconnected(record) => Message::StatusUpdate(StatusPayload::reconnected(record)),
        RegistryEvent::Offline { record, reason, released } => Message::Offline(OfflinePayload {
            agent_id: record.id.clone(),
            reason: reason.to_string(),
            released_task_ids: released.clone(),
            revision: record.revision,
        }),
        RegistryEvent::Deregistered(record) => Message::Offline(OfflinePayload {
            agent_id: record.id.clone(),
            reason: "deregistered".to_string(),
            released_task_ids: record.active_task_ids.clone(),
            revision: record.revision,
        }),
    }
}

/// Broadcast every registry change to observers.
pub fn publish_registry_events<C: Clock>(registry: &AgentRegistry<C>, router: Arc<Router<C>>) -> Subscription {
    registry.subscribe(move |event| {
        router.broadcast(registry_message(event));
        Ok(())
    })
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
