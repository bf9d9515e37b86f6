//! Task and registration types exchanged between the orchestrator and agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of an [`AgentTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::TimedOut | TaskStatus::Cancelled
        )
    }
}

/// The family of capability an agent registers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Validator,
    Dependency,
    Semantic,
    Mutation,
    Impact,
    Conflict,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Validator => "validator",
            AgentType::Dependency => "dependency",
            AgentType::Semantic => "semantic",
            AgentType::Mutation => "mutation",
            AgentType::Impact => "impact",
            AgentType::Conflict => "conflict",
        }
    }
}

/// A single named operation an agent exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// Static registration of an agent with the orchestrator's dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub agent_type: AgentType,
    pub capabilities: Vec<Capability>,
    pub priority: i32,
    pub max_concurrent_tasks: u32,
}

impl AgentRegistration {
    pub fn new(agent_id: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type,
            capabilities: Vec::new(),
            priority: 0,
            max_concurrent_tasks: 4,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max: u32) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }
}

/// A unit of work dispatched to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub task_id: String,
    pub proposal_id: String,
    pub agent_id: String,
    pub operation: String,
    pub input_data: Value,
    pub priority: i32,
    #[serde(default)]
    pub status: TaskStatusRecord,
}

/// Mutable lifecycle bookkeeping carried alongside a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusRecord {
    pub status: TaskStatus,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for TaskStatusRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            status: TaskStatus::Queued,
            attempt: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl AgentTask {
    pub fn new(
        task_id: impl Into<String>,
        proposal_id: impl Into<String>,
        agent_id: impl Into<String>,
        operation: impl Into<String>,
        input_data: Value,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            proposal_id: proposal_id.into(),
            agent_id: agent_id.into(),
            operation: operation.into(),
            input_data,
            priority: 0,
            status: TaskStatusRecord::default(),
        }
    }

    pub fn mark_running(&mut self) {
        self.status.status = TaskStatus::Running;
        self.status.attempt += 1;
        self.status.updated_at = Utc::now();
    }

    pub fn mark_terminal(&mut self, status: TaskStatus) {
        debug_assert!(status.is_terminal());
        self.status.status = status;
        self.status.updated_at = Utc::now();
    }
}
