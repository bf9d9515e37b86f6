//! Concrete agent implementations, one module per [`crate::task::AgentType`].

pub mod conflict;
pub mod dependency;
pub mod impact;
pub mod mutation;
pub mod semantic;
pub mod validator;

pub use conflict::ConflictAgent;
pub use dependency::DependencyAgent;
pub use impact::ImpactAgent;
pub use mutation::MutationAgent;
pub use semantic::SemanticAgent;
pub use validator::ValidatorAgent;
