// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job execution.
//!
//! The session hands each assigned task to a [`BenchmarkRunner`] together with
//! a [`Reporter`] for progress and log lines. [`CommandRunner`] runs a shell
//! command per job.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bh_core::TaskId;
use bh_wire::{LogLevel, Message, TaskAssignedPayload, TaskLogPayload, TaskProgressPayload};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An assigned job as the runner sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub task_id: TaskId,
    pub job_ref: String,
    pub job_name: Option<String>,
}

impl From<TaskAssignedPayload> for Job {
    fn from(p: TaskAssignedPayload) -> Self {
        Self { task_id: p.task_id, job_ref: p.job_ref, job_name: p.job_name }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    /// Files to hand to the report uploader
    pub artifacts: Vec<PathBuf>,
}

impl RunOutcome {
    pub fn exited(code: i32) -> Self {
        Self { exit_code: Some(code), ..Self::default() }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::default() }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }

    /// Message for a failed run.
    pub fn failure_message(&self) -> String {
        match (&self.error, self.exit_code) {
            (Some(e), _) => e.clone(),
            (None, Some(code)) => format!("exited with code {code}"),
            (None, None) => "terminated by signal".to_string(),
        }
    }
}

/// Sends task events for one task back to the hub.
#[derive(Debug, Clone)]
pub struct Reporter {
    task_id: TaskId,
    tx: mpsc::Sender<Message>,
}

impl Reporter {
    pub fn new(task_id: TaskId, tx: mpsc::Sender<Message>) -> Self {
        Self { task_id, tx }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub async fn progress(&self, progress_pct: u8, stage: Option<&str>) {
        let payload = TaskProgressPayload {
            task_id: self.task_id.clone(),
            progress_pct: progress_pct.min(100),
            stage: stage.map(str::to_string),
        };
        self.send(Message::TaskProgress(payload)).await;
    }

    pub async fn log(&self, level: LogLevel, line: impl Into<String>) {
        let payload = TaskLogPayload { task_id: self.task_id.clone(), level, line: line.into() };
        self.send(Message::TaskLog(payload)).await;
    }

    async fn send(&self, message: Message) {
        if self.tx.send(message).await.is_err() {
            tracing::debug!(task_id = %self.task_id, "channel gone, task event dropped");
        }
    }
}

#[async_trait]
pub trait BenchmarkRunner: Send + Sync + 'static {
    /// Run `job` to completion or until `cancel` fires.
    async fn run(&self, job: &Job, reporter: &Reporter, cancel: CancellationToken) -> RunOutcome;
}

/// Runs `sh -c <command>` for every job.
///
/// The job is described to the command through `BH_JOB_REF`, `BH_TASK_ID`
/// and `BH_JOB_NAME`. With an artifact root, each task also gets an empty
/// `BH_ARTIFACT_DIR` and the files left there become the run's artifacts.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    command: String,
    artifact_root: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), artifact_root: None }
    }

    pub fn with_artifact_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.artifact_root = Some(root.into());
        self
    }

    fn command_for(&self, job: &Job, artifact_dir: Option<&Path>) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .env("BH_JOB_REF", &job.job_ref)
            .env("BH_TASK_ID", job.task_id.as_str())
            .env("BH_JOB_NAME", job.job_name.as_deref().unwrap_or(""))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = artifact_dir {
            cmd.env("BH_ARTIFACT_DIR", dir);
        }
        cmd
    }
}

#[async_trait]
impl BenchmarkRunner for CommandRunner {
    async fn run(&self, job: &Job, reporter: &Reporter, cancel: CancellationToken) -> RunOutcome {
        let artifact_dir = match &self.artifact_root {
            Some(root) => {
                let dir = root.join(job.task_id.as_str());
                if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                    return RunOutcome::failed(format!("cannot create artifact dir {}: {e}", dir.display()));
                }
                Some(dir)
            }
            None => None,
        };

        let mut child = match self.command_for(job, artifact_dir.as_deref()).spawn() {
            Ok(child) => child,
            Err(e) => return RunOutcome::failed(format!("failed to spawn `{}`: {e}", self.command)),
        };
        tracing::info!(task_id = %job.task_id, job_ref = %job.job_ref, pid = ?child.id(), "job started");

        let stdout = child.stdout.take().map(|s| tokio::spawn(forward_lines(s, reporter.clone(), LogLevel::Info)));
        let stderr = child.stderr.take().map(|s| tokio::spawn(forward_lines(s, reporter.clone(), LogLevel::Warn)));

        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(task_id = %job.task_id, error = %e, "failed to kill job");
                }
                tracing::info!(task_id = %job.task_id, "job cancelled");
                return RunOutcome::failed("cancelled");
            }
        };

        for forwarder in [stdout, stderr].into_iter().flatten() {
            let _ = forwarder.await;
        }

        let mut outcome = match status {
            Ok(status) => RunOutcome { exit_code: status.code(), ..RunOutcome::default() },
            Err(e) => RunOutcome::failed(format!("failed to wait for job: {e}")),
        };
        if let Some(dir) = artifact_dir {
            outcome.artifacts = list_files(&dir).await;
        }
        tracing::info!(task_id = %job.task_id, exit_code = ?outcome.exit_code, "job finished");
        outcome
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(stream: R, reporter: Reporter, level: LogLevel) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => reporter.log(level, line).await,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(task_id = %reporter.task_id(), error = %e, "job output unreadable");
                break;
            }
        }
    }
}

async fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return files;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.is_ok_and(|t| t.is_file()) {
            files.push(entry.path());
        }
    }
    files.sort();
    files
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
