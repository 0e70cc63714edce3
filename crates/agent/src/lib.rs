// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bh-agent: the agent side of the benchmark hub.
//!
//! Registers with the hub, keeps a control-channel session alive, and runs
//! assigned jobs through a [`BenchmarkRunner`].

pub mod client;
pub mod config;
pub mod load;
pub mod register;
pub mod runner;
pub mod session;
pub mod uploader;

#[cfg(test)]
mod test_helpers;

pub use client::{ClientError, DispatchReceipt, HubClient};
pub use config::AgentConfig;
pub use register::register_with_retry;
pub use runner::{BenchmarkRunner, CommandRunner, Job, Reporter, RunOutcome};
pub use session::{AgentSession, SessionError};
pub use uploader::{DirectoryUploader, ReportUploader, UploadError};
