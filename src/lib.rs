pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod perception;
pub mod sandbox;
pub mod tools;

pub use crate::agent_engine::engine::SandboxAgent;
pub use crate::errors::{SandpilotError, SandpilotResult};
pub use crate::orchestrator::engine::Orchestrator;

/// Initialize tracing and load `.env` if present.
///
/// Call once from the embedding application before constructing an agent.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
}
