// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket accept loop for agents and observers.
//!
//! A connection that names an agent (`?agent_id=` or `x-agent-id`) is that
//! agent's control channel; anything else is an observer.

use std::sync::Arc;

use bh_core::{AgentId, Clock};
use bh_wire::Envelope;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message as WsMessage, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handler::handle_agent_message;
use crate::ctx::HubCtx;

const AGENT_ID_HEADER: &str = "x-agent-id";

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// Accept control-channel connections until cancelled.
pub async fn serve<C: Clock>(listener: TcpListener, ctx: Arc<HubCtx<C>>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "channel connection");
                    tokio::spawn(handle_socket(stream, Arc::clone(&ctx), cancel.clone()));
                }
                Err(e) => warn!(error = %e, "channel accept failed"),
            },
        }
    }
}

async fn handle_socket<C: Clock>(stream: TcpStream, ctx: Arc<HubCtx<C>>, cancel: CancellationToken) {
    let mut claimed = None;
    let ws = match tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        claimed = agent_id_from_request(req);
        Ok(resp)
    })
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            debug!(error = %e, "websocket handshake failed");
            return;
        }
    };

    match claimed {
        Some(agent_id) => run_agent(ws, agent_id, &ctx, &cancel).await,
        None => run_observer(ws, &ctx, &cancel).await,
    }
}

/// Agent identity from the upgrade request, query parameter first.
pub(crate) fn agent_id_from_request(req: &Request) -> Option<AgentId> {
    let from_query = req.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| match pair.split_once('=') {
            Some(("agent_id", value)) if !value.is_empty() => Some(value.to_string()),
            _ => None,
        })
    });
    let from_header = || {
        req.headers()
            .get(AGENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    from_query.or_else(from_header).map(AgentId::new)
}

async fn run_agent<C: Clock>(
    mut ws: WebSocketStream<TcpStream>,
    agent_id: AgentId,
    ctx: &HubCtx<C>,
    cancel: &CancellationToken,
) {
    if ctx.registry.get(&agent_id).is_none() {
        info!(agent_id = %agent_id, "channel rejected: unknown agent");
        let frame = CloseFrame { code: CloseCode::Policy, reason: Utf8Bytes::from_static("unknown agent") };
        let _ = ws.close(Some(frame)).await;
        return;
    }

    let (generation, rx) = ctx.router.attach_agent(agent_id.clone());
    info!(agent_id = %agent_id, "agent channel connected");
    let (sink, mut stream) = ws.split();
    let writer = tokio::spawn(write_loop(sink, rx));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = stream.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => match Envelope::from_json(&text) {
                    Ok(envelope) => handle_agent_message(ctx, &agent_id, envelope),
                    Err(e) => warn!(agent_id = %agent_id, error = %e, "malformed channel message"),
                },
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(agent_id = %agent_id, error = %e, "channel read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let current = ctx.router.detach_agent(&agent_id, generation);
    let _ = writer.await;
    // A replaced connection has nothing to report, and shutdown keeps tasks.
    if current && !cancel.is_cancelled() {
        info!(agent_id = %agent_id, "agent channel closed");
        ctx.agent_disconnected(&agent_id);
    }
}

async fn run_observer<C: Clock>(ws: WebSocketStream<TcpStream>, ctx: &HubCtx<C>, cancel: &CancellationToken) {
    let (observer_id, rx) = ctx.router.attach_observer(|| ctx.snapshot());
    let (sink, mut stream) = ws.split();
    let writer = tokio::spawn(write_loop(sink, rx));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = stream.next() => match msg {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                // Observers are read-only
                Some(Ok(_)) => {}
            },
        }
    }

    ctx.router.detach_observer(&observer_id);
    let _ = writer.await;
}

/// Drain one connection's queue onto its socket; closes when the queue does.
async fn write_loop(mut sink: WsSink, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = %envelope.kind(), error = %e, "envelope encode failed");
                continue;
            }
        };
        if let Err(e) = sink.send(WsMessage::text(text)).await {
            debug!(error = %e, "channel write failed");
            return;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
