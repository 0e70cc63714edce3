// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bh: operator CLI for the benchmark hub

mod color;
mod commands;
mod exit_error;
mod output;
mod table;

use anyhow::Result;
use bh_agent::HubClient;
use clap::{Parser, Subcommand};

use crate::commands::agent::AgentArgs;
use crate::commands::tasks::StatusArg;
use crate::commands::ConstraintArgs;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "bh", version, about = "Query and drive a benchmark hub", styles = color::styles())]
struct Cli {
    /// Hub RPC address
    #[arg(long, global = true, env = "BH_HUB", default_value = "127.0.0.1:7420")]
    hub: String,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every registered agent
    Agents,
    /// List agents that can take a task now
    Available {
        #[command(flatten)]
        constraints: ConstraintArgs,
    },
    /// List tasks, newest first
    Tasks {
        /// Only tasks bound to this agent id
        #[arg(long)]
        agent: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show one task
    Task { id: String },
    /// Task counts by status
    Stats,
    /// Create a task and send it to an agent
    Dispatch {
        /// Benchmark job reference passed to the agent
        job_ref: String,
        /// Display name for the job
        #[arg(long)]
        name: Option<String>,
        /// Target agent id (default: let the hub choose)
        #[arg(long, conflicts_with_all = ["platform", "capabilities", "tags"])]
        agent: Option<String>,
        #[command(flatten)]
        constraints: ConstraintArgs,
    },
    /// Cancel a task that has not finished
    Cancel { id: String },
    /// Record a task's outcome by hand
    Complete {
        id: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        exit_code: i32,
        /// Where the results live
        #[arg(long)]
        result: Option<String>,
    },
    /// Delete a finished task record
    Delete { id: String },
    /// Remove an agent from the registry
    Deregister { agent_id: String },
    /// Follow hub events, one per line
    Watch {
        /// Control-channel address (default: hub host on port 7421)
        #[arg(long)]
        channel: Option<String>,
    },
    /// Run an agent that executes jobs with a shell command
    Agent(AgentArgs),
}

async fn run(cli: Cli) -> Result<()> {
    let format = OutputFormat::from_json_flag(cli.json);
    let client = HubClient::new(cli.hub.clone());

    match cli.command {
        Command::Agents => commands::agents::list(&client, format).await,
        Command::Available { constraints } => {
            commands::agents::available(&client, constraints.into_constraints(), format).await
        }
        Command::Tasks { agent, status, limit } => {
            commands::tasks::list(&client, commands::tasks::filter(agent, status, limit), format).await
        }
        Command::Task { id } => commands::tasks::show(&client, &id, format).await,
        Command::Stats => commands::tasks::stats(&client, format).await,
        Command::Dispatch { job_ref, name, agent, constraints } => {
            commands::tasks::dispatch(&client, &job_ref, name, agent, constraints.into_constraints(), format).await
        }
        Command::Cancel { id } => commands::tasks::cancel(&client, &id, format).await,
        Command::Complete { id, exit_code, result } => {
            commands::tasks::complete(&client, &id, exit_code, result, format).await
        }
        Command::Delete { id } => commands::tasks::delete(&client, &id, format).await,
        Command::Deregister { agent_id } => commands::agents::deregister(&client, &agent_id, format).await,
        Command::Watch { channel } => {
            let url = commands::watch::channel_url(&cli.hub, channel.as_deref());
            commands::watch::watch(&url, format).await
        }
        Command::Agent(args) => commands::agent::run(args, &cli.hub).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(exit_error::exit_code(&err));
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
