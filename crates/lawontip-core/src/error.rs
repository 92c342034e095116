use std::path::PathBuf;

use lawontip_llm::{ErrorKind, LlmError};
use lawontip_memory::VectorStoreError;

/// Startup failures. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required API keys: {} (set them in the environment or in .env)", .0.join(", "))]
    MissingSecrets(Vec<&'static str>),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("vector store not found at {}; run `lawontip ingest` first", .0.display())]
    IndexMissing(PathBuf),

    #[error("failed to open vector store: {0}")]
    Index(VectorStoreError),

    #[error("secret lookup failed: {0}")]
    Vault(String),
}

/// Failure of one query pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("query embedding failed: {0}")]
    Embedding(#[source] LlmError),

    #[error("completion failed: {0}")]
    Completion(#[source] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),
}

pub const GENERIC_APOLOGY: &str = "I apologize, but I encountered an error while processing your request. Please try again.";

impl AssistantError {
    /// Text shown in the chat in place of an answer.
    #[must_use]
    pub fn user_message(&self) -> String {
        let (service, err) = match self {
            Self::Embedding(e) => ("embedding", e),
            Self::Completion(e) => ("language model", e),
            Self::Retrieval(_) => return GENERIC_APOLOGY.to_owned(),
        };
        match err.kind() {
            ErrorKind::Authentication => format!(
                "Authentication with the {service} service failed. Please check the configured API key."
            ),
            ErrorKind::Transient => format!(
                "The {service} service is temporarily unavailable, please try again in a moment."
            ),
            ErrorKind::Other => GENERIC_APOLOGY.to_owned(),
        }
    }
}
