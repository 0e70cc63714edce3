// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC listener.
//!
//! Each TCP connection carries any number of length-prefixed requests, each
//! answered in order. Handlers are synchronous against hub state, so a slow
//! client only ever holds its own connection.

mod query;

use std::fmt::Display;
use std::sync::Arc;

use bh_core::{Clock, Registration};
use bh_wire::{self as wire, ErrorKind, ProtocolError, Request, Response, PROTOCOL_VERSION};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ctx::HubCtx;
use crate::ledger::{status_message, DispatchError, DispatchRequest, LedgerError};
use crate::registry::RegistryError;
use crate::sink::CommandSink;

/// Listener task for accepting RPC connections.
pub struct Listener<C: Clock> {
    tcp: TcpListener,
    ctx: Arc<HubCtx<C>>,
}

impl<C: Clock> Listener<C> {
    pub fn new(tcp: TcpListener, ctx: Arc<HubCtx<C>>) -> Self {
        Self { tcp, ctx }
    }

    /// Accept connections until cancelled, one task per connection.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.tcp.accept() => match result {
                    Ok((stream, addr)) => {
                        debug!(%addr, "rpc connection");
                        let ctx = Arc::clone(&self.ctx);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            tokio::select! {
                                _ = cancel.cancelled() => {}
                                result = handle_connection(reader, writer, &ctx) => {
                                    if let Err(e) = result {
                                        log_connection_error(e);
                                    }
                                }
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "rpc accept failed"),
                },
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::Timeout(_) => debug!("rpc connection idle, closing"),
        _ => warn!(error = %e, "rpc connection error"),
    }
}

/// Serve requests until the client hangs up.
async fn handle_connection<R, W, C>(mut reader: R, mut writer: W, ctx: &HubCtx<C>) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    C: Clock,
{
    loop {
        let request = match wire::read_request(&mut reader, ctx.ipc_timeout).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(ProtocolError::Json(e)) => {
                let response = Response::error(ErrorKind::InvalidRequest, format!("malformed request: {e}"));
                wire::write_response(&mut writer, &response, ctx.ipc_timeout).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        if matches!(request, Request::Query { .. } | Request::Ping | Request::Heartbeat { .. }) {
            debug!(request = ?request, "received request");
        } else {
            info!(request = ?request, "received request");
        }

        let response = handle_request(request, ctx);
        wire::write_response(&mut writer, &response, ctx.ipc_timeout).await?;
    }
}

/// Handle a single request and return a response.
pub(crate) fn handle_request<C: Clock>(request: Request, ctx: &HubCtx<C>) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                debug!(client = %version, hub = PROTOCOL_VERSION, "protocol version differs");
            }
            Response::Hello { version: PROTOCOL_VERSION.to_string() }
        }

        Request::Register(reg) => handle_register(ctx, &reg),

        Request::Heartbeat { agent_id, report } => match ctx.heartbeat(&agent_id, &report) {
            Ok(_) => Response::Ok,
            Err(e) => error_response(e),
        },

        Request::Deregister { agent_id } => match ctx.deregister(&agent_id) {
            Ok(_) => Response::Ok,
            Err(e) => error_response(e),
        },

        Request::Dispatch { job_ref, job_name, agent_id, constraints } => {
            if job_ref.trim().is_empty() {
                return Response::error(ErrorKind::InvalidRequest, "job_ref must not be empty");
            }
            let req = DispatchRequest { job_ref, job_name, agent_id, constraints };
            match ctx.ledger.create_and_dispatch(req) {
                Ok(d) => Response::Dispatched { task_id: d.task_id, agent_id: d.agent_id, agent_name: d.agent_name },
                Err(e) => error_response(e),
            }
        }

        Request::UpdateTask { task_id, status, patch } => {
            match ctx.ledger.update_status(&task_id, status, &patch.unwrap_or_default()) {
                Ok(record) => {
                    ctx.router.broadcast(status_message(&record));
                    Response::Ok
                }
                Err(e) => error_response(e),
            }
        }

        Request::Cancel { task_id } => match ctx.ledger.cancel(&task_id) {
            Ok(delivered) => Response::Cancelled { delivered },
            Err(e) => error_response(e),
        },

        Request::DeleteTask { task_id } => match ctx.ledger.delete(&task_id) {
            Ok(_) => Response::Ok,
            Err(e) => error_response(e),
        },

        Request::Query { query } => query::handle_query(ctx, query),
    }
}

fn handle_register<C: Clock>(ctx: &HubCtx<C>, reg: &Registration) -> Response {
    if reg.name.trim().is_empty() || reg.host.trim().is_empty() {
        return Response::error(ErrorKind::InvalidRequest, "name and host are required");
    }
    if reg.max_concurrency == Some(0) {
        return Response::error(ErrorKind::InvalidRequest, "max_concurrency must be at least 1");
    }
    let record = ctx.registry.register(reg);
    Response::Registered { agent_id: record.id }
}

/// Error classification for the wire.
trait ErrorKindOf: Display {
    fn kind(&self) -> ErrorKind;
}

impl ErrorKindOf for RegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::AgentNotFound(_) => ErrorKind::NotFound,
            RegistryError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            RegistryError::AgentOffline(_) => ErrorKind::Unreachable,
        }
    }
}

impl ErrorKindOf for LedgerError {
    fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::TaskNotFound(_) => ErrorKind::NotFound,
            LedgerError::IllegalTransition { .. }
            | LedgerError::AlreadyTerminal { .. }
            | LedgerError::NotTerminal { .. } => ErrorKind::IllegalTransition,
            LedgerError::NotOwner { .. } | LedgerError::NotATaskEvent => ErrorKind::InvalidRequest,
        }
    }
}

impl ErrorKindOf for DispatchError {
    fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::AgentNotFound(_) => ErrorKind::NotFound,
            DispatchError::NoEligibleAgent | DispatchError::AgentUnavailable { .. } => ErrorKind::CapacityExceeded,
            DispatchError::Unreachable { .. } => ErrorKind::Unreachable,
        }
    }
}

fn error_response<E: ErrorKindOf>(e: E) -> Response {
    Response::error(e.kind(), e.to_string())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
