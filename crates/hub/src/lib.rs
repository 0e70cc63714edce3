// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bh-hub: the benchmark hub.
//!
//! Tracks registered agents, binds benchmark tasks to them, and carries
//! commands and progress over a persistent control channel.

pub mod channel;
pub mod config;
pub mod ctx;
pub mod env;
pub mod ledger;
pub mod lifecycle;
pub mod listener;
pub mod observer;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod sweeper;

#[cfg(test)]
mod test_helpers;

pub use config::HubConfig;
pub use ctx::HubCtx;
pub use ledger::{DispatchError, DispatchRequest, Dispatched, LedgerError, TaskLedger};
pub use lifecycle::{Hub, LifecycleError};
pub use registry::{AgentRegistry, OfflineReason, RegistryError, RegistryEvent};
pub use sink::{ChannelError, CommandSink};
