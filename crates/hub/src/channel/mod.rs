// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent control channel: WebSocket connections from agents and
//! observers, and the routing between them and hub state.

mod events;
mod handler;
mod router;
mod server;

pub use events::{publish_registry_events, registry_message};
pub use handler::handle_agent_message;
pub use router::{Router, DEFAULT_QUEUE_CAPACITY};
pub use server::serve;
