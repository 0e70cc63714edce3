// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod agent;
pub mod agents;
pub mod tasks;
pub mod watch;

use clap::Args;

use bh_core::Constraints;

/// Placement filters shared by `available` and `dispatch`.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ConstraintArgs {
    /// Required platform, e.g. linux
    #[arg(long)]
    pub platform: Option<String>,
    /// Required capability (repeatable)
    #[arg(long = "capability", value_name = "CAP")]
    pub capabilities: Vec<String>,
    /// Required tag (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

impl ConstraintArgs {
    /// `None` when no filter was given.
    pub fn into_constraints(self) -> Option<Constraints> {
        let constraints = Constraints {
            platform: self.platform,
            capabilities: self.capabilities.into_iter().collect(),
            tags: self.tags.into_iter().collect(),
        };
        (!constraints.is_empty()).then_some(constraints)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
