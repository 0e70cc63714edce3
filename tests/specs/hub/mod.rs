// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod agent_session;
mod capacity;
mod liveness;
mod observers;
mod persistence;
