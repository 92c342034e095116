mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use crate::error::ConfigError;
use crate::vault::{Secret, VaultProvider};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting values are inconsistent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?;
            toml::from_str::<Self>(&content).map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.splitter
            .to_splitter_config()
            .validate()
            .map_err(ConfigError::Invalid)?;
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be at least 1".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "embedding.batch_size must be at least 1".into(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Invalid("llm.max_tokens must be at least 1".into()));
        }
        if let Some(t) = self.llm.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be between 0 and 2, got {t}"
            )));
        }
        if self.prompt.budget_tokens == 0 {
            return Err(ConfigError::Invalid(
                "prompt.budget_tokens must be at least 1".into(),
            ));
        }
        if self.timeouts.llm_seconds == 0 || self.timeouts.embedding_seconds == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".into()));
        }
        Ok(())
    }

    /// Resolve the API keys through the vault. Both keys are required; an
    /// empty value counts as missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecrets`] naming every absent key, or
    /// [`ConfigError::Vault`] if the backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> Result<(), ConfigError> {
        let mut missing = Vec::new();

        match lookup(vault, GOOGLE_API_KEY).await? {
            Some(val) => self.secrets.google_api_key = Some(Secret::new(val)),
            None => missing.push(GOOGLE_API_KEY),
        }
        match lookup(vault, GROQ_API_KEY).await? {
            Some(val) => self.secrets.groq_api_key = Some(Secret::new(val)),
            None => missing.push(GROQ_API_KEY),
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingSecrets(missing))
        }
    }
}

async fn lookup(vault: &dyn VaultProvider, key: &str) -> Result<Option<String>, ConfigError> {
    let value = vault
        .get_secret(key)
        .await
        .map_err(|e| ConfigError::Vault(format!("{key}: {e:#}")))?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}
