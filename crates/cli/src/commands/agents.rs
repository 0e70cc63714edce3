// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bh agents`, `bh available`, `bh deregister`

use std::io::Write;

use anyhow::Result;
use bh_agent::HubClient;
use bh_core::{AgentId, AgentRecord, Constraints};

use crate::color;
use crate::output::{format_ago, format_pct, handle_list, now_ms, OutputFormat};
use crate::table::{Column, Table};

pub async fn list(client: &HubClient, format: OutputFormat) -> Result<()> {
    let agents = client.list_agents().await?;
    let now = now_ms();
    handle_list(format, &agents, "No agents registered", |items, out| format_agent_list(out, items, now))
}

pub async fn available(client: &HubClient, constraints: Option<Constraints>, format: OutputFormat) -> Result<()> {
    let agents = client.list_available(constraints).await?;
    let now = now_ms();
    handle_list(format, &agents, "No available agents", |items, out| format_agent_list(out, items, now))
}

pub async fn deregister(client: &HubClient, agent_id: &str, format: OutputFormat) -> Result<()> {
    let agent_id = AgentId::new(agent_id);
    client.deregister(&agent_id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "deregistered": agent_id })),
        OutputFormat::Text => println!("Agent {} deregistered", color::header(agent_id.as_str())),
    }
    Ok(())
}

pub(crate) fn format_agent_list(out: &mut (impl Write + ?Sized), agents: &[AgentRecord], now_ms: u64) {
    let cols = vec![
        Column::muted("ID").with_max(8),
        Column::left("NAME").with_max(20),
        Column::left("HOST"),
        Column::left("PLATFORM"),
        Column::status("STATUS"),
        Column::right("SLOTS"),
        Column::right("CPU"),
        Column::right("MEM"),
        Column::right("SEEN"),
        Column::left("TAGS").with_max(30),
    ];
    let mut table = Table::new(cols);

    for agent in agents {
        let tags: Vec<&str> = agent.tags.iter().map(String::as_str).collect();
        table.row(vec![
            agent.id.to_string(),
            agent.name.clone(),
            agent.host.clone(),
            format!("{}/{}", agent.platform, agent.arch),
            agent.status.to_string(),
            format!("{}/{}", agent.active_task_ids.len(), agent.max_concurrency),
            format_pct(agent.cpu_usage_pct),
            format_pct(agent.mem_usage_pct),
            format_ago(agent.last_heartbeat_at_ms, now_ms),
            if tags.is_empty() { "-".to_string() } else { tags.join(",") },
        ]);
    }

    table.render(out);
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
