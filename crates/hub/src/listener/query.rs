// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only query handlers.

use bh_core::Clock;
use bh_wire::{Query, Response};

use crate::ctx::HubCtx;

pub(super) fn handle_query<C: Clock>(ctx: &HubCtx<C>, query: Query) -> Response {
    match query {
        Query::ListAgents => Response::Agents { agents: ctx.registry.list() },
        Query::GetAgent { id } => Response::Agent { agent: ctx.registry.get(&id).map(Box::new) },
        Query::ListAvailable { constraints } => {
            Response::Agents { agents: ctx.registry.list_available(constraints.as_ref()) }
        }
        Query::ListTasks { filter } => Response::Tasks { tasks: ctx.ledger.list(&filter) },
        Query::GetTask { id } => Response::Task { task: ctx.ledger.get(&id).map(Box::new) },
        Query::TaskStats => Response::Stats { stats: ctx.ledger.stats() },
    }
}
