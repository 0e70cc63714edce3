// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC client for the hub.
//!
//! Each call opens its own TCP connection, sends one request and reads one
//! response, all bounded by the client timeout.

use std::time::Duration;

use bh_core::{
    AgentId, AgentRecord, Constraints, LoadReport, Registration, TaskId, TaskPatch, TaskRecord, TaskStats,
    TaskStatus,
};
use bh_wire::{self as wire, ErrorKind, ProtocolError, Query, Request, Response, TaskFilter, PROTOCOL_VERSION};
use thiserror::Error;
use tokio::net::TcpStream;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot reach hub at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{kind}: {message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl ClientError {
    /// The hub's classification, when the hub answered with an error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub agent_name: String,
}

#[derive(Debug, Clone)]
pub struct HubClient {
    addr: String,
    timeout: Duration,
}

impl HubClient {
    /// `addr` is `host:port` of the hub's RPC listener.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and read its response.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let connect = TcpStream::connect(&self.addr);
        let stream = match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ClientError::Connect { addr: self.addr.clone(), source }),
            Err(_) => return Err(ProtocolError::Timeout(self.timeout).into()),
        };
        let (mut reader, mut writer) = stream.into_split();
        wire::write_request(&mut writer, request, self.timeout).await?;
        Ok(wire::read_response(&mut reader, self.timeout).await?)
    }

    fn reject<T>(response: Response) -> Result<T, ClientError> {
        match response {
            Response::Error { kind, message } => Err(ClientError::Rejected { kind, message }),
            other => Err(ClientError::Unexpected(format!("{other:?}"))),
        }
    }

    async fn expect_ok(&self, request: &Request) -> Result<(), ClientError> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            other => Self::reject(other),
        }
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(&Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Self::reject(other),
        }
    }

    /// Hub version via the Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self.send(&Request::Hello { version: PROTOCOL_VERSION.to_string() }).await? {
            Response::Hello { version } => Ok(version),
            other => Self::reject(other),
        }
    }

    pub async fn register(&self, registration: &Registration) -> Result<AgentId, ClientError> {
        match self.send(&Request::Register(registration.clone())).await? {
            Response::Registered { agent_id } => Ok(agent_id),
            other => Self::reject(other),
        }
    }

    pub async fn heartbeat(&self, agent_id: &AgentId, report: LoadReport) -> Result<(), ClientError> {
        self.expect_ok(&Request::Heartbeat { agent_id: agent_id.clone(), report }).await
    }

    pub async fn deregister(&self, agent_id: &AgentId) -> Result<(), ClientError> {
        self.expect_ok(&Request::Deregister { agent_id: agent_id.clone() }).await
    }

    pub async fn dispatch(
        &self,
        job_ref: &str,
        job_name: Option<String>,
        agent_id: Option<AgentId>,
        constraints: Option<Constraints>,
    ) -> Result<DispatchReceipt, ClientError> {
        let request = Request::Dispatch { job_ref: job_ref.to_string(), job_name, agent_id, constraints };
        match self.send(&request).await? {
            Response::Dispatched { task_id, agent_id, agent_name } => {
                Ok(DispatchReceipt { task_id, agent_id, agent_name })
            }
            other => Self::reject(other),
        }
    }

    pub async fn update_task(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        patch: Option<TaskPatch>,
    ) -> Result<(), ClientError> {
        self.expect_ok(&Request::UpdateTask { task_id: task_id.clone(), status, patch }).await
    }

    /// Returns whether the cancellation reached the agent.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<bool, ClientError> {
        match self.send(&Request::Cancel { task_id: task_id.clone() }).await? {
            Response::Cancelled { delivered } => Ok(delivered),
            other => Self::reject(other),
        }
    }

    pub async fn delete_task(&self, task_id: &TaskId) -> Result<(), ClientError> {
        self.expect_ok(&Request::DeleteTask { task_id: task_id.clone() }).await
    }

    async fn query(&self, query: Query) -> Result<Response, ClientError> {
        self.send(&Request::Query { query }).await
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentRecord>, ClientError> {
        match self.query(Query::ListAgents).await? {
            Response::Agents { agents } => Ok(agents),
            other => Self::reject(other),
        }
    }

    pub async fn get_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>, ClientError> {
        match self.query(Query::GetAgent { id: id.clone() }).await? {
            Response::Agent { agent } => Ok(agent.map(|b| *b)),
            other => Self::reject(other),
        }
    }

    pub async fn list_available(&self, constraints: Option<Constraints>) -> Result<Vec<AgentRecord>, ClientError> {
        match self.query(Query::ListAvailable { constraints }).await? {
            Response::Agents { agents } => Ok(agents),
            other => Self::reject(other),
        }
    }

    pub async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<TaskRecord>, ClientError> {
        match self.query(Query::ListTasks { filter }).await? {
            Response::Tasks { tasks } => Ok(tasks),
            other => Self::reject(other),
        }
    }

    pub async fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, ClientError> {
        match self.query(Query::GetTask { id: id.clone() }).await? {
            Response::Task { task } => Ok(task.map(|b| *b)),
            other => Self::reject(other),
        }
    }

    pub async fn stats(&self) -> Result<TaskStats, ClientError> {
        match self.query(Query::TaskStats).await? {
            Response::Stats { stats } => Ok(stats),
            other => Self::reject(other),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
