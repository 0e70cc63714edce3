// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Greedy agent selection.

use bh_core::AgentRecord;

/// Pick the least-loaded candidate.
///
/// `candidates` is the registry's already-filtered availability list. Lower
/// reported CPU wins; an agent that never reported CPU sorts last. Remaining
/// ties go to the agent holding fewer tasks, then the smaller id, so the
/// choice is deterministic.
pub fn select_best(candidates: &[AgentRecord]) -> Option<&AgentRecord> {
    candidates.iter().min_by(|a, b| {
        cpu_key(a)
            .total_cmp(&cpu_key(b))
            .then_with(|| a.active_task_ids.len().cmp(&b.active_task_ids.len()))
            .then_with(|| a.id.cmp(&b.id))
    })
}

fn cpu_key(agent: &AgentRecord) -> f64 {
    match agent.cpu_usage_pct {
        Some(pct) if !pct.is_nan() => pct,
        _ => f64::INFINITY,
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
