// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::*;

#[derive(Parser)]
struct TestCli {
    #[command(flatten)]
    constraints: ConstraintArgs,
}

#[test]
fn no_flags_is_no_constraints() {
    let cli = TestCli::parse_from(["test"]);
    assert_eq!(cli.constraints.into_constraints(), None);
}

#[test]
fn repeated_flags_collect() {
    let cli = TestCli::parse_from(["test", "--platform", "linux", "--capability", "gpu", "--capability", "avx512", "--tag", "lab"]);
    let constraints = cli.constraints.into_constraints().unwrap();
    assert_eq!(constraints.platform.as_deref(), Some("linux"));
    assert_eq!(constraints.capabilities.len(), 2);
    assert!(constraints.tags.contains("lab"));
}
