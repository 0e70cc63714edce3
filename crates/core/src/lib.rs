// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bh-core: domain types shared by the benchmark hub, its agents, and the CLI

pub mod macros;

pub mod agent;
pub mod clock;
pub mod constraints;
pub mod id;
pub mod task;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{AgentId, AgentRecord, AgentStatus, LoadReport, Registration};
pub use clock::{Clock, FakeClock, SystemClock};
pub use constraints::Constraints;
pub use id::short;
pub use task::{TaskId, TaskPatch, TaskRecord, TaskStats, TaskStatus, TransitionError};
