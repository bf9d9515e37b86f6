//! Mutation engine binary: loads configuration, wires up an [`Engine`] with
//! one fallback-capable instance of each capability agent, and runs until
//! signalled to stop.

use std::sync::Arc;

use agent_runtime::agents::{
    ConflictAgent, DependencyAgent, ImpactAgent, MutationAgent, SemanticAgent, ValidatorAgent,
};
use agent_runtime::{AgentRegistration, AgentType};
use orchestrator::config::EngineConfig;
use orchestrator::engine::Engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    tracing::info!("loading mutation engine configuration");
    let config = match std::env::var("MUTATION_ENGINE_CONFIG") {
        Ok(path) => {
            let config = EngineConfig::from_yaml_file(&path)?;
            tracing::info!(path, "configuration loaded");
            config
        }
        Err(_) => {
            tracing::info!("MUTATION_ENGINE_CONFIG unset, using defaults");
            EngineConfig::default()
        }
    };

    let engine = Engine::new(config);
    register_default_agents(&engine);
    tracing::info!("mutation engine ready");

    shutdown_signal().await;
    tracing::info!("mutation engine shutting down");
    Ok(())
}

fn register_default_agents(engine: &Engine) {
    engine.register_agent(
        AgentRegistration::new("validator-1", AgentType::Validator),
        Arc::new(ValidatorAgent::new("validator-1", None)),
    );
    engine.register_agent(
        AgentRegistration::new("dependency-1", AgentType::Dependency),
        Arc::new(DependencyAgent::new("dependency-1", None)),
    );
    engine.register_agent(
        AgentRegistration::new("semantic-1", AgentType::Semantic),
        Arc::new(SemanticAgent::new("semantic-1", None)),
    );
    engine.register_agent(
        AgentRegistration::new("impact-1", AgentType::Impact),
        Arc::new(ImpactAgent::new("impact-1", None)),
    );
    engine.register_agent(
        AgentRegistration::new("mutation-1", AgentType::Mutation),
        Arc::new(MutationAgent::new("mutation-1", None)),
    );
    engine.register_agent(
        AgentRegistration::new("conflict-1", AgentType::Conflict),
        Arc::new(ConflictAgent::new("conflict-1", None)),
    );
}

/// Signal for graceful shutdown (Ctrl-C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received CTRL-C signal"),
        _ = terminate => tracing::info!("received SIGTERM signal"),
    }
}
