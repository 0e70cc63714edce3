// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A real agent session against the hub, watched by an observer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bh_agent::{
    AgentConfig, AgentSession, BenchmarkRunner, CommandRunner, Job, Reporter, RunOutcome, SessionError,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;

/// Reports two progress steps and succeeds.
struct TwoStep;

#[async_trait]
impl BenchmarkRunner for TwoStep {
    async fn run(&self, _job: &Job, reporter: &Reporter, _cancel: CancellationToken) -> RunOutcome {
        reporter.progress(50, Some("measure")).await;
        reporter.progress(100, Some("done")).await;
        RunOutcome::exited(0)
    }
}

fn agent_config(hub: &TestHub, name: &str) -> AgentConfig {
    let mut config = AgentConfig::new(name, "127.0.0.1");
    config.hub_host = hub.hub.rpc_addr().ip().to_string();
    config.rpc_port = hub.hub.rpc_addr().port();
    config.channel_port = hub.hub.channel_addr().port();
    config.heartbeat_interval = Duration::from_millis(100);
    config.registration_backoff = Duration::from_millis(50);
    config
}

fn spawn_session(session: AgentSession) -> (CancellationToken, JoinHandle<Result<(), SessionError>>) {
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { session.run(cancel).await }
    });
    (cancel, handle)
}

async fn wait_connected(hub: &TestHub, agent_id: &AgentId) {
    let ctx = Arc::clone(hub.hub.ctx());
    eventually("agent session connected", || {
        let connected = ctx.router.is_connected(agent_id);
        async move { connected.then_some(()) }
    })
    .await;
}

#[tokio::test]
async fn observer_sees_assignment_progress_and_completion() {
    let hub = TestHub::start().await;
    let config = agent_config(&hub, "runner-1");
    let agent_id = config.agent_id();
    let (cancel, running) = spawn_session(AgentSession::new(config, Arc::new(TwoStep)));
    wait_connected(&hub, &agent_id).await;

    let mut observer = hub.channel(None).await;
    observer.recv_kind(MessageType::Snapshot).await;

    let receipt = hub.client().dispatch("bench/cpu", Some("cpu".into()), None, None).await.unwrap();
    assert_eq!(receipt.agent_id, agent_id);

    let mut seen = Vec::new();
    loop {
        let envelope = observer.recv().await;
        if envelope.message.task_id() != Some(&receipt.task_id) {
            continue;
        }
        seen.push(envelope.kind());
        if envelope.kind() == MessageType::TaskCompleted {
            break;
        }
    }
    assert_eq!(seen.first(), Some(&MessageType::TaskAssigned));
    assert!(seen.contains(&MessageType::TaskProgress));
    assert!(!seen.contains(&MessageType::TaskFailed));

    let task = hub.client().get_task(&receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress_pct, 100);

    cancel.cancel();
    running.await.unwrap().unwrap();
    hub.stop().await;
}

#[tokio::test]
async fn failing_command_marks_the_task_failed() {
    let hub = TestHub::start().await;
    let config = agent_config(&hub, "runner-2");
    let agent_id = config.agent_id();
    let runner = CommandRunner::new("echo \"running $BH_JOB_REF\"; exit 3");
    let (cancel, running) = spawn_session(AgentSession::new(config, Arc::new(runner)));
    wait_connected(&hub, &agent_id).await;

    let client = hub.client();
    let receipt = client.dispatch("bench/broken", None, Some(agent_id), None).await.unwrap();

    let task = eventually("task finished", || {
        let client = client.clone();
        let task_id = receipt.task_id.clone();
        async move { client.get_task(&task_id).await.ok().flatten().filter(|t| t.is_terminal()) }
    })
    .await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.exit_code, Some(3));
    assert_eq!(task.error_message.as_deref(), Some("exited with code 3"));

    cancel.cancel();
    running.await.unwrap().unwrap();
    hub.stop().await;
}
