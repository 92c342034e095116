use std::path::PathBuf;
use std::str::FromStr;

use super::Config;

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LAWONTIP_DOCUMENTS_DIR") {
            self.documents.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LAWONTIP_INDEX_DIR") {
            self.index.dir = PathBuf::from(v);
        }
        if let Some(size) = parsed::<usize>("LAWONTIP_CHUNK_SIZE") {
            self.splitter.chunk_size = size;
        }
        if let Some(overlap) = parsed::<usize>("LAWONTIP_CHUNK_OVERLAP") {
            self.splitter.chunk_overlap = overlap;
        }
        if let Some(k) = parsed::<usize>("LAWONTIP_TOP_K") {
            self.retrieval.top_k = k;
        }
        if let Ok(v) = std::env::var("LAWONTIP_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LAWONTIP_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("LAWONTIP_HOST") {
            self.gateway.host = v;
        }
        if let Some(port) = parsed::<u16>("LAWONTIP_PORT") {
            self.gateway.port = port;
        }
        if let Some(retries) = parsed::<u32>("LAWONTIP_MAX_RETRIES") {
            self.timeouts.max_retries = retries;
        }
        if let Some(secs) = parsed::<u64>("LAWONTIP_TIMEOUT_LLM") {
            self.timeouts.llm_seconds = secs;
        }
        if let Some(secs) = parsed::<u64>("LAWONTIP_TIMEOUT_EMBEDDING") {
            self.timeouts.embedding_seconds = secs;
        }
    }
}
