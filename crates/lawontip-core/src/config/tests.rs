use std::io::Write;
use std::path::PathBuf;

use lawontip_memory::Metric;
use serial_test::serial;

use super::*;
use crate::error::ConfigError;
use crate::vault::MockVaultProvider;

const ENV_KEYS: [&str; 12] = [
    "LAWONTIP_DOCUMENTS_DIR",
    "LAWONTIP_INDEX_DIR",
    "LAWONTIP_CHUNK_SIZE",
    "LAWONTIP_CHUNK_OVERLAP",
    "LAWONTIP_TOP_K",
    "LAWONTIP_LLM_MODEL",
    "LAWONTIP_EMBEDDING_MODEL",
    "LAWONTIP_HOST",
    "LAWONTIP_PORT",
    "LAWONTIP_MAX_RETRIES",
    "LAWONTIP_TIMEOUT_LLM",
    "LAWONTIP_TIMEOUT_EMBEDDING",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    (dir, path)
}

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.documents.dir, PathBuf::from("data"));
    assert!(!config.documents.include_text_files);
    assert_eq!(config.index.dir, PathBuf::from("my_vector_store"));
    assert_eq!(config.index.metric, Metric::Cosine);
    assert_eq!(config.splitter.chunk_size, 1000);
    assert_eq!(config.splitter.chunk_overlap, 200);
    assert_eq!(config.embedding.model, "models/embedding-001");
    assert_eq!(config.llm.provider, "groq");
    assert_eq!(config.llm.model, "llama3-70b-8192");
    assert!(config.llm.temperature.is_none());
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.memory.history_window, 2);
    assert_eq!(config.prompt.budget_tokens, 6000);
    assert_eq!(config.gateway.port, 8501);
    assert_eq!(config.timeouts.max_retries, 1);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.gateway.host, "127.0.0.1");
}

#[test]
#[serial]
fn load_partial_toml() {
    clear_env();
    let (_dir, path) = write_config(
        r#"
[splitter]
chunk_size = 500
chunk_overlap = 50

[index]
dir = "store"
metric = "l2"

[llm]
model = "llama-3.1-8b-instant"
temperature = 0.2

[gateway]
port = 9000
"#,
    );
    let config = Config::load(&path).unwrap();
    assert_eq!(config.splitter.chunk_size, 500);
    assert_eq!(config.splitter.chunk_overlap, 50);
    assert!(config.splitter.sentence_aware);
    assert_eq!(config.index.dir, PathBuf::from("store"));
    assert_eq!(config.index.metric, Metric::L2);
    assert_eq!(config.llm.model, "llama-3.1-8b-instant");
    assert_eq!(config.llm.temperature, Some(0.2));
    assert_eq!(config.llm.max_tokens, 1024);
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.host, "127.0.0.1");
}

#[test]
#[serial]
fn shipped_config_matches_defaults() {
    clear_env();
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
    let shipped = Config::load(&path).unwrap();
    let defaults = Config::default();
    assert_eq!(
        toml::to_string(&shipped).unwrap(),
        toml::to_string(&defaults).unwrap()
    );
}

#[test]
#[serial]
fn load_rejects_malformed_toml() {
    clear_env();
    let (_dir, path) = write_config("[splitter\nchunk_size = ");
    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let (_dir, path) = write_config("[retrieval]\ntop_k = 8\n");
    unsafe {
        std::env::set_var("LAWONTIP_TOP_K", "3");
        std::env::set_var("LAWONTIP_INDEX_DIR", "/tmp/lawontip-index");
        std::env::set_var("LAWONTIP_PORT", "8080");
        std::env::set_var("LAWONTIP_LLM_MODEL", "mixtral-8x7b-32768");
        std::env::set_var("LAWONTIP_TIMEOUT_LLM", "60");
        std::env::set_var("LAWONTIP_MAX_RETRIES", "2");
    }
    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.index.dir, PathBuf::from("/tmp/lawontip-index"));
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.llm.model, "mixtral-8x7b-32768");
    assert_eq!(config.timeouts.llm_seconds, 60);
    assert_eq!(config.timeouts.max_retries, 2);
}

#[test]
#[serial]
fn invalid_env_value_is_ignored() {
    clear_env();
    unsafe { std::env::set_var("LAWONTIP_PORT", "not-a-port") };
    let config = Config::load(&PathBuf::from("/nonexistent/lawontip.toml")).unwrap();
    clear_env();
    assert_eq!(config.gateway.port, 8501);
}

#[test]
#[serial]
fn overlap_not_smaller_than_chunk_size_is_rejected() {
    clear_env();
    unsafe {
        std::env::set_var("LAWONTIP_CHUNK_SIZE", "100");
        std::env::set_var("LAWONTIP_CHUNK_OVERLAP", "100");
    }
    let err = Config::load(&PathBuf::from("/nonexistent/lawontip.toml")).unwrap_err();
    clear_env();
    assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("chunk_overlap")));
}

#[test]
fn validate_rejects_zero_top_k_and_bad_temperature() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.llm.temperature = Some(3.5);
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn resolve_secrets_stores_both_keys() {
    let vault = MockVaultProvider::new()
        .with_secret(GOOGLE_API_KEY, "g-key")
        .with_secret(GROQ_API_KEY, "gsk-key");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    assert_eq!(config.secrets.google_api_key.unwrap().expose(), "g-key");
    assert_eq!(config.secrets.groq_api_key.unwrap().expose(), "gsk-key");
}

#[tokio::test]
async fn missing_secrets_names_every_key() {
    let mut config = Config::default();
    let err = config
        .resolve_secrets(&MockVaultProvider::new())
        .await
        .unwrap_err();
    match err {
        ConfigError::MissingSecrets(keys) => assert_eq!(keys, [GOOGLE_API_KEY, GROQ_API_KEY]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn empty_secret_counts_as_missing() {
    let vault = MockVaultProvider::new()
        .with_secret(GOOGLE_API_KEY, "g-key")
        .with_secret(GROQ_API_KEY, "  ");
    let mut config = Config::default();
    let err = config.resolve_secrets(&vault).await.unwrap_err();
    assert!(err.to_string().contains("GROQ_API_KEY"));
    assert!(!err.to_string().contains("GOOGLE_API_KEY"));
}
