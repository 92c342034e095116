//! Application bootstrap: config resolution, client and index construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lawontip_llm::Embedder;
use lawontip_llm::any::{AnyCompleter, AnyEmbedder};
use lawontip_llm::gemini::GeminiEmbedder;
use lawontip_llm::openai::OpenAiProvider;
use lawontip_memory::{FlatIndex, VectorStore, VectorStoreError};
use tokio::sync::watch;

use crate::assistant::{Assistant, AssistantSettings};
use crate::config::{Config, GOOGLE_API_KEY, GROQ_API_KEY};
use crate::error::ConfigError;
use crate::vault::{EnvVaultProvider, VaultProvider};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const DOTENV_PATH: &str = ".env";

pub struct AppBuilder {
    config: Config,
}

impl AppBuilder {
    /// Resolve the config path, load it and resolve secrets from the
    /// environment and `.env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is unreadable or invalid, or if an API
    /// key is missing.
    pub async fn from_env(cli_config: Option<&Path>) -> Result<Self, ConfigError> {
        let vault = EnvVaultProvider::with_dotenv(Path::new(DOTENV_PATH))
            .map_err(|e| ConfigError::Vault(format!("{e:#}")))?;
        Self::load(&resolve_config_path(cli_config), &vault).await
    }

    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub async fn load(config_path: &Path, vault: &dyn VaultProvider) -> Result<Self, ConfigError> {
        let mut config = Config::load(config_path)?;
        config.resolve_secrets(vault).await?;
        tracing::debug!(path = %config_path.display(), "configuration loaded");
        Ok(Self { config })
    }

    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecrets`] if the Google key was not resolved.
    pub fn build_embedder(&self) -> Result<AnyEmbedder, ConfigError> {
        create_embedder(&self.config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecrets`] if the Groq key was not resolved.
    pub fn build_completer(&self) -> Result<AnyCompleter, ConfigError> {
        create_completer(&self.config)
    }

    /// # Errors
    ///
    /// See [`open_index`].
    pub fn build_index(&self, embedder: &impl Embedder) -> Result<Arc<FlatIndex>, ConfigError> {
        open_index(&self.config, embedder.model())
    }

    /// Wire the query pipeline over the persisted index.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is missing or the index cannot be opened.
    pub fn build_assistant(&self) -> Result<Assistant<AnyEmbedder, AnyCompleter>, ConfigError> {
        let embedder = self.build_embedder()?;
        let completer = self.build_completer()?;
        let index = self.build_index(&embedder)?;
        tracing::info!(
            chunks = index.len(),
            embedding = embedder.model(),
            llm = %self.config.llm.model,
            "assistant ready"
        );
        Ok(Assistant::new(
            embedder,
            completer,
            index,
            AssistantSettings::from(&self.config),
        ))
    }

    #[must_use]
    pub fn build_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }
}

/// Priority: `--config` argument > `LAWONTIP_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_owned();
    }
    if let Ok(path) = std::env::var("LAWONTIP_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// # Errors
///
/// Returns [`ConfigError::MissingSecrets`] if the Google key was not resolved.
pub fn create_embedder(config: &Config) -> Result<AnyEmbedder, ConfigError> {
    let key = config
        .secrets
        .google_api_key
        .as_ref()
        .ok_or_else(|| ConfigError::MissingSecrets(vec![GOOGLE_API_KEY]))?;
    let embedder = GeminiEmbedder::new(key.expose().to_owned(), &config.embedding.model)
        .with_base_url(config.embedding.base_url.clone())
        .with_timeout(Duration::from_secs(config.timeouts.embedding_seconds))
        .with_max_retries(config.timeouts.max_retries);
    Ok(AnyEmbedder::Gemini(embedder))
}

/// # Errors
///
/// Returns [`ConfigError::MissingSecrets`] if the Groq key was not resolved.
pub fn create_completer(config: &Config) -> Result<AnyCompleter, ConfigError> {
    let key = config
        .secrets
        .groq_api_key
        .as_ref()
        .ok_or_else(|| ConfigError::MissingSecrets(vec![GROQ_API_KEY]))?;
    let provider = OpenAiProvider::new(
        config.llm.provider.clone(),
        key.expose().to_owned(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.max_tokens,
    )
    .with_timeout(Duration::from_secs(config.timeouts.llm_seconds))
    .with_temperature(config.llm.temperature)
    .with_max_retries(config.timeouts.max_retries);
    Ok(AnyCompleter::OpenAi(provider))
}

/// Load the persisted index named by `config.index.dir`.
///
/// # Errors
///
/// Returns [`ConfigError::IndexMissing`] if nothing has been ingested yet and
/// [`ConfigError::Index`] if the file is unreadable or incompatible.
pub fn open_index(config: &Config, embedding_model: &str) -> Result<Arc<FlatIndex>, ConfigError> {
    let index = FlatIndex::open(&config.index.dir).map_err(|e| match e {
        VectorStoreError::NotFound(path) => ConfigError::IndexMissing(path),
        other => ConfigError::Index(other),
    })?;
    if index.embedding_model() != embedding_model {
        tracing::warn!(
            index_model = index.embedding_model(),
            configured = embedding_model,
            "index was built with a different embedding model; re-run ingestion"
        );
    }
    if index.metric() != config.index.metric {
        tracing::warn!(
            index_metric = %index.metric(),
            configured = %config.index.metric,
            "configured metric differs from the index; using the index metric"
        );
    }
    Ok(Arc::new(index))
}
