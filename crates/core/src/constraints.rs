// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placement constraints for agent selection.

use crate::agent::AgentRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Requirements an agent must satisfy to receive a task.
///
/// Empty constraints match every agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    /// Exact platform (case-insensitive), e.g. `linux`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Every listed capability must be present
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub capabilities: BTreeSet<String>,
    /// Every listed tag must be present
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.platform.is_none() && self.capabilities.is_empty() && self.tags.is_empty()
    }

    pub fn matches(&self, agent: &AgentRecord) -> bool {
        if let Some(platform) = &self.platform {
            if !platform.eq_ignore_ascii_case(&agent.platform) {
                return false;
            }
        }
        self.capabilities.is_subset(&agent.capabilities) && self.tags.is_subset(&agent.tags)
    }
}

#[cfg(test)]
#[path = "constraints_tests.rs"]
mod tests;
