use std::path::PathBuf;

use lawontip_llm::gemini::GEMINI_BASE_URL;
use lawontip_llm::openai::GROQ_BASE_URL;
use lawontip_memory::Metric;
use lawontip_memory::document::DEFAULT_MAX_FILE_SIZE;
use serde::{Deserialize, Serialize};

use crate::vault::Secret;

pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const GROQ_API_KEY: &str = "GROQ_API_KEY";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub splitter: SplitterSection,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
    /// Also ingest `.txt` and `.md` files.
    #[serde(default)]
    pub include_text_files: bool,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
            include_text_files: false,
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SplitterSection {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub sentence_aware: bool,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_true() -> bool {
    true
}

impl Default for SplitterSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            sentence_aware: true,
        }
    }
}

impl SplitterSection {
    #[must_use]
    pub fn to_splitter_config(&self) -> lawontip_memory::document::SplitterConfig {
        lawontip_memory::document::SplitterConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            sentence_aware: self.sentence_aware,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub metric: Metric,
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("my_vector_store")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            metric: Metric::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// Chunks per embedding request during ingestion.
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model() -> String {
    "models/embedding-001".into()
}

fn default_embedding_base_url() -> String {
    GEMINI_BASE_URL.into()
}

fn default_embedding_batch_size() -> usize {
    100
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Name used in logs and error messages.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_llm_provider() -> String {
    "groq".into()
}

fn default_llm_base_url() -> String {
    GROQ_BASE_URL.into()
}

fn default_llm_model() -> String {
    "llama3-70b-8192".into()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    /// Input budget in estimated tokens (chars / 4).
    #[serde(default = "default_budget_tokens")]
    pub budget_tokens: usize,
}

fn default_budget_tokens() -> usize {
    6000
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            budget_tokens: default_budget_tokens(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Most recent turns fed back into the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Idle time after which a browser session is discarded.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

fn default_history_window() -> usize {
    2
}

fn default_session_ttl() -> u64 {
    1800
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Requests per minute per client IP.
    #[serde(default = "default_gateway_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8501
}

fn default_gateway_rate_limit() -> u32 {
    60
}

fn default_gateway_max_body() -> usize {
    65_536
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            rate_limit: default_gateway_rate_limit(),
            max_body_size: default_gateway_max_body(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    /// Retries after a rate-limit or transient failure of a hosted API call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: default_llm_timeout(),
            embedding_seconds: default_embedding_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub google_api_key: Option<Secret>,
    pub groq_api_key: Option<Secret>,
}
