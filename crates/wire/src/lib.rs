// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol types spoken between the hub, agents, the CLI and observers.
//!
//! Two transports share these types:
//! - RPC: 4-byte length prefix (big-endian) + JSON payload over TCP
//! - Control channel: one JSON [`Envelope`] per WebSocket text frame

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod channel;
mod query;
mod request;
mod response;
mod wire;

pub use channel::{
    AgentRegisteredPayload, Envelope, HeartbeatAckPayload, LogLevel, Message, MessageType,
    OfflinePayload, SnapshotPayload, StatusPayload, TaskAssignedPayload, TaskCancelledPayload,
    TaskCompletedPayload, TaskFailedPayload, TaskLogPayload, TaskProgressPayload,
};
pub use query::{Query, TaskFilter};
pub use request::Request;
pub use response::{ErrorKind, Response};
pub use wire::{decode, encode, read_message, write_message, ProtocolError, MAX_FRAME_BYTES};
pub use wire::{read_request, read_response, write_request, write_response};

/// Protocol version exchanged in `Hello`.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");
