//! Agent execution contract, structured verdicts, and the provider-agnostic
//! model client used by every agent's primary path.
//!
//! Concrete agents live under [`agents`]; each pairs a model-delegating
//! primary path with a deterministic fallback so a provider outage degrades
//! to lower-confidence verdicts rather than failing the proposal outright.

pub mod agent;
pub mod agents;
pub mod error;
pub mod model_client;
pub mod task;
pub mod verdict;

pub use agent::Agent;
pub use error::{AgentError, Result};
pub use model_client::{
    ChatCompletion, ChatMessage, ChatRequest, HostedModelClient, LocalModelClient, ModelClient,
    ModelClientConfig,
};
pub use task::{AgentRegistration, AgentTask, AgentType, Capability, TaskStatus};
pub use verdict::Verdict;
