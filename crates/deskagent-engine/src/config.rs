//! Engine configuration.
//!
//! All environment lookup happens in [`EngineConfig::from_env`]; everything
//! downstream receives the config by value, so tests construct configs
//! directly and never touch the environment.

use std::path::PathBuf;

/// Routing-class model used by the supervisor.
pub const DEFAULT_ROUTING_MODEL: &str = "gemini-2.5-flash";

/// Cloud model used by non-local workers.
pub const DEFAULT_WORKER_MODEL: &str = "gemini-2.0-flash";

/// Local model used by privacy-sensitive workers.
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2";

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Constructor-injected engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// API key for the cloud provider; absent means cloud workers fail fast
    pub google_api_key: Option<String>,

    pub routing_model: String,

    pub worker_model: String,

    pub local_model: String,

    pub ollama_base_url: String,

    /// Checkpoint database location
    pub database_path: PathBuf,
}

impl EngineConfig {
    /// Read configuration from the environment.
    ///
    /// * `GOOGLE_API_KEY` — cloud provider key
    /// * `DESKAGENT_DATA_DIR` — overrides the data directory
    /// * `OLLAMA_BASE_URL` — overrides the local model endpoint
    pub fn from_env() -> Self {
        Self {
            google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            routing_model: DEFAULT_ROUTING_MODEL.to_string(),
            worker_model: DEFAULT_WORKER_MODEL.to_string(),
            local_model: DEFAULT_LOCAL_MODEL.to_string(),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_BASE_URL.to_string()),
            database_path: Self::default_database_path(),
        }
    }

    /// `$DESKAGENT_DATA_DIR/checkpoints.db`, or `~/.deskagent/checkpoints.db`.
    pub fn default_database_path() -> PathBuf {
        let data_dir = std::env::var("DESKAGENT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".deskagent")
            });
        data_dir.join("checkpoints.db")
    }
}
