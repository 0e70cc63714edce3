// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent session: register, hold the control channel open, run tasks.
//!
//! One connection at a time. When it drops, every running task is cancelled
//! (the hub fails them on disconnect), and the session re-registers and
//! reconnects after the registration backoff.

use std::sync::Arc;

use bh_core::{AgentId, AgentStatus, Clock, SystemClock, TaskId};
use bh_wire::{
    Envelope, Message, ProtocolError, StatusPayload, TaskAssignedPayload, TaskCompletedPayload, TaskFailedPayload,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, HubClient};
use crate::config::AgentConfig;
use crate::load;
use crate::register::register_with_retry;
use crate::runner::{BenchmarkRunner, Job, Reporter, RunOutcome};
use crate::uploader::ReportUploader;

const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("registration failed: {0}")]
    Register(#[from] ClientError),

    #[error("control channel: {0}")]
    Channel(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("control channel closed by hub")]
    Closed,
}

/// Tasks currently running on this agent, in start order.
#[derive(Debug)]
pub(crate) struct SessionState {
    max_concurrency: usize,
    running: Vec<(TaskId, CancellationToken)>,
}

impl SessionState {
    pub(crate) fn new(max_concurrency: u32) -> Self {
        Self { max_concurrency: max_concurrency.max(1) as usize, running: Vec::new() }
    }

    /// Claim a slot. `None` when full or already running.
    pub(crate) fn try_start(&mut self, task_id: &TaskId) -> Option<CancellationToken> {
        if self.running.len() >= self.max_concurrency || self.is_running(task_id) {
            return None;
        }
        let token = CancellationToken::new();
        self.running.push((task_id.clone(), token.clone()));
        Some(token)
    }

    pub(crate) fn is_running(&self, task_id: &TaskId) -> bool {
        self.running.iter().any(|(id, _)| id == task_id)
    }

    pub(crate) fn finish(&mut self, task_id: &TaskId) {
        self.running.retain(|(id, _)| id != task_id);
    }

    pub(crate) fn cancel(&mut self, task_id: &TaskId) -> bool {
        match self.running.iter().find(|(id, _)| id == task_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, token) in self.running.drain(..) {
            token.cancel();
        }
    }

    pub(crate) fn task_ids(&self) -> Vec<TaskId> {
        self.running.iter().map(|(id, _)| id.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.running.len()
    }
}

pub struct AgentSession {
    config: AgentConfig,
    client: HubClient,
    runner: Arc<dyn BenchmarkRunner>,
    uploader: Option<Arc<dyn ReportUploader>>,
    state: Arc<Mutex<SessionState>>,
}

impl AgentSession {
    pub fn new(config: AgentConfig, runner: Arc<dyn BenchmarkRunner>) -> Self {
        let client = HubClient::new(config.rpc_addr());
        let state = Arc::new(Mutex::new(SessionState::new(config.max_concurrency)));
        Self { config, client, runner, uploader: None, state }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn ReportUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run until `cancel` fires or registration gives up.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SessionError> {
        let registration = self.config.registration();
        loop {
            let registered = register_with_retry(
                &self.client,
                &registration,
                self.config.registration_backoff,
                self.config.max_registration_attempts,
                &cancel,
            )
            .await?;
            let Some(agent_id) = registered else {
                return Ok(());
            };

            match self.serve(&agent_id, &cancel).await {
                Ok(()) => {
                    self.state.lock().cancel_all();
                    return Ok(());
                }
                Err(e) => tracing::warn!(agent_id = %agent_id, error = %e, "control channel lost"),
            }
            self.state.lock().cancel_all();

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.config.registration_backoff) => {}
            }
        }
    }

    /// One control-channel connection. `Ok` only on shutdown.
    async fn serve(&self, agent_id: &AgentId, cancel: &CancellationToken) -> Result<(), SessionError> {
        let url = self.config.channel_url(agent_id);
        let (ws, _) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = tokio_tungstenite::connect_async(url.as_str()) => result?,
        };
        tracing::info!(agent_id = %agent_id, url = %url, "control channel connected");
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);

        // First tick fires immediately and doubles as the hello heartbeat
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let status = self.status(agent_id, AgentStatus::Offline);
                    send(&mut sink, status).await?;
                    let _ = sink.close().await;
                    tracing::info!(agent_id = %agent_id, "session shut down");
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    let status = self.status(agent_id, self.derived_status());
                    send(&mut sink, status).await?;
                }
                Some(message) = rx.recv() => send(&mut sink, message).await?,
                frame = stream.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => match Envelope::from_json(&text) {
                        Ok(envelope) => self.handle(agent_id, envelope.message, &tx),
                        Err(e) => tracing::warn!(agent_id = %agent_id, error = %e, "malformed message from hub"),
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        tracing::info!(agent_id = %agent_id, frame = ?frame, "hub closed control channel");
                        return Err(SessionError::Closed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(SessionError::Closed),
                },
            }
        }
    }

    fn derived_status(&self) -> AgentStatus {
        if self.state.lock().len() == 0 {
            AgentStatus::Online
        } else {
            AgentStatus::Busy
        }
    }

    fn status(&self, agent_id: &AgentId, status: AgentStatus) -> Message {
        let sample = load::sample(self.config.cpu_count);
        let active_task_ids = self.state.lock().task_ids();
        Message::StatusUpdate(StatusPayload {
            agent_id: agent_id.clone(),
            status,
            cpu_usage_pct: sample.cpu_usage_pct,
            mem_usage_pct: sample.mem_usage_pct,
            current_task_id: active_task_ids.first().cloned(),
            active_task_ids,
            reconnected: false,
            revision: 0,
        })
    }

    fn handle(&self, agent_id: &AgentId, message: Message, tx: &mpsc::Sender<Message>) {
        match message {
            Message::TaskAssigned(assigned) => self.start_task(agent_id, assigned, tx),
            Message::TaskCancelled(p) => {
                if self.state.lock().cancel(&p.task_id) {
                    tracing::info!(task_id = %p.task_id, reason = ?p.reason, "task cancelled by hub");
                } else {
                    tracing::debug!(task_id = %p.task_id, "cancel for a task not running here");
                }
            }
            Message::HeartbeatAck(ack) => tracing::debug!(status = %ack.status, "heartbeat acknowledged"),
            other => tracing::debug!(kind = %other.kind(), "ignoring message"),
        }
    }

    fn start_task(&self, agent_id: &AgentId, assigned: TaskAssignedPayload, tx: &mpsc::Sender<Message>) {
        if &assigned.agent_id != agent_id {
            tracing::warn!(task_id = %assigned.task_id, assigned_to = %assigned.agent_id, "assignment for another agent");
            return;
        }
        let task_id = assigned.task_id.clone();
        let claimed = {
            let mut state = self.state.lock();
            if state.is_running(&task_id) {
                tracing::debug!(task_id = %task_id, "duplicate assignment ignored");
                return;
            }
            state.try_start(&task_id)
        };
        let Some(token) = claimed else {
            tracing::warn!(task_id = %task_id, "rejecting task, agent at capacity");
            let failed = Message::TaskFailed(TaskFailedPayload {
                task_id,
                error_message: "agent at capacity".to_string(),
                exit_code: None,
            });
            if tx.try_send(failed).is_err() {
                tracing::warn!("outbound queue full, capacity rejection dropped");
            }
            return;
        };

        let job = Job::from(assigned);
        let reporter = Reporter::new(job.task_id.clone(), tx.clone());
        let runner = Arc::clone(&self.runner);
        let uploader = self.uploader.clone();
        let state = Arc::clone(&self.state);
        let tx = tx.clone();
        tokio::spawn(async move {
            reporter.progress(0, Some("started")).await;
            let outcome = runner.run(&job, &reporter, token.clone()).await;
            state.lock().finish(&job.task_id);
            if token.is_cancelled() {
                return;
            }
            let message = completion(&job, outcome, uploader.as_deref()).await;
            if tx.send(message).await.is_err() {
                tracing::warn!(task_id = %job.task_id, "channel gone, task result dropped");
            }
        });
    }
}

/// Final task event for a finished run.
async fn completion(job: &Job, outcome: RunOutcome, uploader: Option<&dyn ReportUploader>) -> Message {
    if !outcome.succeeded() {
        return Message::TaskFailed(TaskFailedPayload {
            task_id: job.task_id.clone(),
            error_message: outcome.failure_message(),
            exit_code: outcome.exit_code,
        });
    }
    let result_ref = match uploader {
        Some(uploader) => match uploader.upload(job, &outcome.artifacts).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(task_id = %job.task_id, error = %e, "report upload failed");
                None
            }
        },
        None => None,
    };
    Message::TaskCompleted(TaskCompletedPayload { task_id: job.task_id.clone(), exit_code: 0, result_ref })
}

async fn send<S>(sink: &mut S, message: Message) -> Result<(), SessionError>
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = Envelope::new(message, SystemClock.epoch_ms()).to_json()?;
    sink.send(WsMessage::text(json)).await?;
    Ok(())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
