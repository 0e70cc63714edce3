// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error carrying a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`, so
//! `main()` owns process termination.

use std::fmt;

use bh_agent::ClientError;
use bh_wire::ErrorKind;

/// Generic failure
pub const EXIT_FAILURE: i32 = 1;
/// Hub not reachable
pub const EXIT_UNREACHABLE: i32 = 2;
/// Unknown agent or task
pub const EXIT_NOT_FOUND: i32 = 3;
/// Hub refused the request (capacity, state machine, validation)
pub const EXIT_REJECTED: i32 = 4;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<ClientError> for ExitError {
    fn from(err: ClientError) -> Self {
        Self::new(client_exit_code(&err), err.to_string())
    }
}

fn client_exit_code(err: &ClientError) -> i32 {
    match err {
        ClientError::Connect { .. } => EXIT_UNREACHABLE,
        ClientError::Rejected { kind: ErrorKind::NotFound, .. } => EXIT_NOT_FOUND,
        ClientError::Rejected { kind: ErrorKind::Internal, .. } => EXIT_FAILURE,
        ClientError::Rejected { .. } => EXIT_REJECTED,
        ClientError::Protocol(_) | ClientError::Unexpected(_) => EXIT_FAILURE,
    }
}

/// Exit code for an error that reached `main`.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code;
    }
    match err.downcast_ref::<ClientError>() {
        Some(client) => client_exit_code(client),
        None => EXIT_FAILURE,
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
