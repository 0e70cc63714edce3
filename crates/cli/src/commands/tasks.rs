// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task commands: list, show, stats, dispatch, cancel, complete, delete

use std::io::Write;

use anyhow::Result;
use bh_agent::HubClient;
use bh_core::{AgentId, Constraints, TaskId, TaskPatch, TaskRecord, TaskStats, TaskStatus};
use bh_wire::TaskFilter;
use clap::ValueEnum;

use crate::color;
use crate::exit_error::{ExitError, EXIT_NOT_FOUND};
use crate::output::{format_ago, format_or_json, handle_list, now_ms, OutputFormat};
use crate::table::{Column, Table};

/// Task status as typed on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Dispatched,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl From<StatusArg> for TaskStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => TaskStatus::Pending,
            StatusArg::Dispatched => TaskStatus::Dispatched,
            StatusArg::Running => TaskStatus::Running,
            StatusArg::Completed => TaskStatus::Completed,
            StatusArg::Failed => TaskStatus::Failed,
            StatusArg::Cancelled => TaskStatus::Cancelled,
        }
    }
}

pub fn filter(agent: Option<String>, status: Option<StatusArg>, limit: Option<usize>) -> TaskFilter {
    TaskFilter { agent_id: agent.map(AgentId::new), status: status.map(TaskStatus::from), limit }
}

pub async fn list(client: &HubClient, filter: TaskFilter, format: OutputFormat) -> Result<()> {
    let tasks = client.list_tasks(filter).await?;
    let now = now_ms();
    handle_list(format, &tasks, "No tasks", |items, out| format_task_list(out, items, now))
}

pub async fn show(client: &HubClient, id: &str, format: OutputFormat) -> Result<()> {
    let Some(task) = client.get_task(&TaskId::new(id)).await? else {
        return Err(ExitError::new(EXIT_NOT_FOUND, format!("task not found: {id}")).into());
    };
    let now = now_ms();
    format_or_json(format, &task, || format_task_detail(&mut std::io::stdout(), &task, now))
}

pub async fn stats(client: &HubClient, format: OutputFormat) -> Result<()> {
    let stats = client.stats().await?;
    format_or_json(format, &stats, || format_stats(&mut std::io::stdout(), &stats))
}

pub async fn dispatch(
    client: &HubClient,
    job_ref: &str,
    name: Option<String>,
    agent: Option<String>,
    constraints: Option<Constraints>,
    format: OutputFormat,
) -> Result<()> {
    let receipt = client.dispatch(job_ref, name, agent.map(AgentId::new), constraints).await?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "task_id": receipt.task_id,
                "agent_id": receipt.agent_id,
                "agent_name": receipt.agent_name,
            })
        ),
        OutputFormat::Text => println!(
            "Dispatched {} to {} ({})",
            color::header(receipt.task_id.as_str()),
            receipt.agent_name,
            color::muted(receipt.agent_id.as_str())
        ),
    }
    Ok(())
}

pub async fn cancel(client: &HubClient, id: &str, format: OutputFormat) -> Result<()> {
    let task_id = TaskId::new(id);
    let delivered = client.cancel(&task_id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "task_id": task_id, "delivered": delivered })),
        OutputFormat::Text if delivered => println!("Cancelled {}", color::header(id)),
        OutputFormat::Text => println!("Cancelled {} (agent not connected, not notified)", color::header(id)),
    }
    Ok(())
}

/// The status and patch that record a finished run.
pub fn completion(exit_code: i32, result: Option<String>) -> (TaskStatus, TaskPatch) {
    if exit_code == 0 {
        (TaskStatus::Completed, TaskPatch { result_ref: result, exit_code: Some(0), ..TaskPatch::default() })
    } else {
        let patch = TaskPatch {
            result_ref: result,
            exit_code: Some(exit_code),
            error_message: Some(format!("exit code {exit_code}")),
            ..TaskPatch::default()
        };
        (TaskStatus::Failed, patch)
    }
}

/// Record the outcome of a task by hand, for runs reported outside an agent.
pub async fn complete(
    client: &HubClient,
    id: &str,
    exit_code: i32,
    result: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let task_id = TaskId::new(id);
    let Some(task) = client.get_task(&task_id).await? else {
        return Err(ExitError::new(EXIT_NOT_FOUND, format!("task not found: {id}")).into());
    };
    let (status, patch) = completion(exit_code, result);
    // Completion is only reachable from running
    if task.status == TaskStatus::Dispatched && status == TaskStatus::Completed {
        client.update_task(&task_id, TaskStatus::Running, None).await?;
    }
    client.update_task(&task_id, status, Some(patch)).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "task_id": task_id, "status": status })),
        OutputFormat::Text => println!("Task {} {}", color::header(id), color::status(&status.to_string())),
    }
    Ok(())
}

pub async fn delete(client: &HubClient, id: &str, format: OutputFormat) -> Result<()> {
    let task_id = TaskId::new(id);
    client.delete_task(&task_id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "deleted": task_id })),
        OutputFormat::Text => println!("Deleted {}", color::header(id)),
    }
    Ok(())
}

pub(crate) fn format_task_list(out: &mut (impl Write + ?Sized), tasks: &[TaskRecord], now_ms: u64) {
    let cols = vec![
        Column::muted("ID"),
        Column::left("JOB").with_max(32),
        Column::muted("AGENT").with_max(8),
        Column::status("STATUS"),
        Column::right("PROGRESS"),
        Column::right("AGE"),
    ];
    let mut table = Table::new(cols);

    for task in tasks {
        table.row(vec![
            task.id.to_string(),
            task.job_name.clone().unwrap_or_else(|| task.job_ref.clone()),
            task.agent_id.to_string(),
            task.status.to_string(),
            format!("{}%", task.progress_pct),
            format_ago(task.created_at_ms, now_ms),
        ]);
    }

    table.render(out);
}

pub(crate) fn format_task_detail(out: &mut (impl Write + ?Sized), task: &TaskRecord, now_ms: u64) {
    let ago = |ms: Option<u64>| ms.map_or_else(|| "-".to_string(), |ms| format!("{} ago", format_ago(ms, now_ms)));
    let _ = writeln!(out, "{} {}", color::header("Task:"), task.id);
    let _ = writeln!(out, "  Job:        {}", task.job_ref);
    if let Some(name) = &task.job_name {
        let _ = writeln!(out, "  Name:       {name}");
    }
    let _ = writeln!(out, "  Agent:      {}", task.agent_id);
    let _ = writeln!(out, "  Status:     {}", color::status(&task.status.to_string()));
    let _ = writeln!(out, "  Progress:   {}%", task.progress_pct);
    let _ = writeln!(out, "  Created:    {}", ago(Some(task.created_at_ms)));
    let _ = writeln!(out, "  Dispatched: {}", ago(task.dispatched_at_ms));
    let _ = writeln!(out, "  Started:    {}", ago(task.started_at_ms));
    let _ = writeln!(out, "  Finished:   {}", ago(task.completed_at_ms));
    if let Some(code) = task.exit_code {
        let _ = writeln!(out, "  Exit code:  {code}");
    }
    if let Some(result) = &task.result_ref {
        let _ = writeln!(out, "  Result:     {result}");
    }
    if let Some(error) = &task.error_message {
        let _ = writeln!(out, "  Error:      {error}");
    }
}

pub(crate) fn format_stats(out: &mut (impl Write + ?Sized), stats: &TaskStats) {
    let _ = writeln!(out, "{} {}", color::header("Tasks:"), stats.total);
    for status in TaskStatus::ALL {
        let _ = writeln!(out, "  {:<11} {}", status.to_string(), stats.get(status));
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
