//! The agent execution contract: every agent exposes a primary path that may
//! delegate to a [`ModelClient`] and a deterministic fallback that never
//! leaves the process.

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::task::AgentTask;
use crate::verdict::Verdict;

/// A bounded unit of execution: `execute(task) -> verdict`.
///
/// Implementations must not let a primary-path failure propagate to the
/// caller — [`Agent::execute`]'s default body already does this by calling
/// [`Agent::execute_fallback`] whenever [`Agent::execute_primary`] errors, so
/// most agents only need to implement the two path methods.
#[async_trait]
pub trait Agent: Send + Sync {
    fn agent_id(&self) -> &str;

    /// Attempts the model-delegating path. Returning `Err` here engages the
    /// fallback; it is never surfaced directly to the orchestrator.
    async fn execute_primary(&self, task: &AgentTask) -> Result<Verdict>;

    /// Deterministic, local-only execution. Must always succeed for any
    /// operation the agent's registration advertises.
    async fn execute_fallback(&self, task: &AgentTask) -> Result<Verdict>;

    /// Runs the primary path, silently falling back on failure. Agents
    /// should not need to override this.
    async fn execute(&self, task: &AgentTask) -> Result<Verdict> {
        match self.execute_primary(task).await {
            Ok(verdict) => Ok(verdict),
            Err(err) => {
                warn!(
                    agent_id = self.agent_id(),
                    task_id = %task.task_id,
                    error = %err,
                    "primary execution path failed, engaging fallback"
                );
                self.execute_fallback(task).await
            }
        }
    }
}
