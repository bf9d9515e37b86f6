//! Validator agent: checks a proposal's content against required sections and
//! required fields, primary path delegates to a model for nuanced review.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::model_client::{ChatMessage, ChatRequest, ModelClient};
use crate::task::AgentTask;
use crate::verdict::{Verdict, ValidatorVerdict, VerdictEnvelope};

const SYSTEM_PROMPT: &str = "You are a Validator Agent for a specification mutation engine. \
Check proposals and specs for required structure (an Overview/Summary section and an \
Implementation/Details section), required fields, and internal consistency. Respond with a \
JSON object: {is_valid, errors, warnings, suggestions, confidence_score, reasoning}.";

#[derive(Debug, Deserialize)]
struct ProposalInput {
    #[serde(default)]
    spec_id: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    content: String,
    #[serde(default)]
    breaking_changes: bool,
}

pub struct ValidatorAgent {
    agent_id: String,
    model: Option<Arc<dyn ModelClient>>,
}

impl ValidatorAgent {
    pub fn new(agent_id: impl Into<String>, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model,
        }
    }

    fn validate_content(content: &str) -> Vec<String> {
        let overview = Regex::new(r"(?i)#+\s*(Overview|Summary)").unwrap();
        let implementation = Regex::new(r"(?i)#+\s*(Implementation|Details)").unwrap();

        let mut errors = Vec::new();
        if !overview.is_match(content) {
            errors.push("missing Overview section".to_string());
        }
        if !implementation.is_match(content) {
            errors.push("missing Implementation section".to_string());
        }
        errors
    }

    fn validate_proposal_deterministic(input: &ProposalInput) -> ValidatorVerdict {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut suggestions = Vec::new();

        if input.spec_id.is_empty() {
            errors.push("spec_id is required".to_string());
        }
        if input.reasoning.is_empty() {
            warnings.push("no reasoning provided for the mutation".to_string());
        }
        if input.confidence < 0.5 {
            warnings.push(format!("low confidence score: {}", input.confidence));
        }
        if !input.content.is_empty() {
            errors.extend(Self::validate_content(&input.content));
        }
        if input.breaking_changes {
            warnings.push("this mutation includes breaking changes".to_string());
        }
        if errors.is_empty() && warnings.is_empty() {
            suggestions.push("consider adding tests for the new functionality".to_string());
        }

        let is_valid = errors.is_empty();
        ValidatorVerdict {
            envelope: VerdictEnvelope {
                agent_id: String::new(),
                confidence_score: if is_valid { 0.8 } else { 0.6 },
                reasoning: "rule-based structural validation".to_string(),
                fallback_mode: true,
            },
            is_valid,
            errors,
            warnings,
            suggestions,
        }
    }
}

#[async_trait]
impl Agent for ValidatorAgent {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    async fn execute_primary(&self, task: &AgentTask) -> Result<Verdict> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| AgentError::ModelClient("no model client configured".to_string()))?;

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(task.input_data.to_string()),
            ],
            expects_json: true,
        };
        let completion = model.chat(request).await?;

        let mut verdict: ValidatorVerdict = serde_json::from_str(&completion.content)
            .map_err(|e| AgentError::ModelClient(format!("malformed verdict json: {e}")))?;
        verdict.envelope.agent_id = self.agent_id.clone();
        verdict.envelope.fallback_mode = false;
        Ok(Verdict::Validator(verdict))
    }

    async fn execute_fallback(&self, task: &AgentTask) -> Result<Verdict> {
        let payload = match task.operation.as_str() {
            "validate_proposal" => task
                .input_data
                .get("proposal")
                .cloned()
                .unwrap_or(json!({})),
            "validate_spec" => task.input_data.clone(),
            other => {
                return Err(AgentError::UnsupportedOperation {
                    agent_id: self.agent_id.clone(),
                    operation: other.to_string(),
                })
            }
        };
        let input: ProposalInput = serde_json::from_value(payload).unwrap_or(ProposalInput {
            spec_id: String::new(),
            reasoning: String::new(),
            confidence: 1.0,
            content: String::new(),
            breaking_changes: false,
        });

        let mut verdict = Self::validate_proposal_deterministic(&input);
        verdict.envelope.agent_id = self.agent_id.clone();
        Ok(Verdict::Validator(verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(content: &str) -> AgentTask {
        AgentTask::new(
            "t1",
            "p1",
            "validator-1",
            "validate_spec",
            json!({ "content": content }),
        )
    }

    #[tokio::test]
    async fn fallback_flags_missing_sections() {
        let agent = ValidatorAgent::new("validator-1", None);
        let verdict = agent.execute(&task("just some prose")).await.unwrap();
        match verdict {
            Verdict::Validator(v) => {
                assert!(!v.is_valid);
                assert_eq!(v.errors.len(), 2);
                assert!(v.envelope.fallback_mode);
            }
            _ => panic!("expected validator verdict"),
        }
    }

    #[tokio::test]
    async fn fallback_passes_well_structured_content() {
        let agent = ValidatorAgent::new("validator-1", None);
        let content = "# Overview\nDoes a thing.\n# Implementation\nDoes it this way.";
        let verdict = agent.execute(&task(content)).await.unwrap();
        match verdict {
            Verdict::Validator(v) => assert!(v.is_valid),
            _ => panic!("expected validator verdict"),
        }
    }
}
