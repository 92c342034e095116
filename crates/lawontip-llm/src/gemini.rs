use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{EmbedTask, Embedder};
use crate::retry::send_with_retry;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// `batchEmbedContents` accepts at most this many requests per call.
const MAX_BATCH: usize = 100;

const PROVIDER: &str = "gemini";

/// Google Generative Language embedding client.
#[derive(Clone)]
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    /// Always carries the `models/` prefix the API expects.
    model: String,
    max_retries: u32,
}

impl fmt::Debug for GeminiEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiEmbedder")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl GeminiEmbedder {
    #[must_use]
    pub fn new(api_key: String, model: &str) -> Self {
        Self {
            client: crate::http::default_client(Duration::from_secs(30)),
            api_key,
            base_url: GEMINI_BASE_URL.to_owned(),
            model: normalize_model(model),
            max_retries: 1,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = crate::http::default_client(timeout);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn post<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<String, LlmError> {
        let url = format!("{}/{}:{method}", self.base_url, self.model);
        let response = send_with_retry(PROVIDER, self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
        })
        .await?;
        response.text().await.map_err(LlmError::Http)
    }

    async fn embed_chunk(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest::new(&self.model, text, task))
                .collect(),
        };
        let text = self.post("batchEmbedContents", &body).await?;
        let resp: BatchEmbedResponse = serde_json::from_str(&text)?;

        if resp.embeddings.len() != texts.len() {
            return Err(LlmError::Other(format!(
                "gemini returned {} embeddings for {} inputs",
                resp.embeddings.len(),
                texts.len()
            )));
        }
        resp.embeddings
            .into_iter()
            .map(|e| non_empty(e.values))
            .collect()
    }
}

fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_owned()
    } else {
        format!("models/{model}")
    }
}

fn task_type(task: EmbedTask) -> &'static str {
    match task {
        EmbedTask::Document => "RETRIEVAL_DOCUMENT",
        EmbedTask::Query => "RETRIEVAL_QUERY",
    }
}

fn non_empty(values: Vec<f32>) -> Result<Vec<f32>, LlmError> {
    if values.is_empty() {
        Err(LlmError::EmptyResponse {
            provider: PROVIDER.into(),
        })
    } else {
        Ok(values)
    }
}

/// Every vector of one batch must share the first vector's dimension.
fn same_dimension(vectors: &[Vec<f32>]) -> Result<(), LlmError> {
    let Some(expected) = vectors.first().map(Vec::len) else {
        return Ok(());
    };
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(LlmError::DimensionMismatch {
            expected,
            actual: v.len(),
        }),
        None => Ok(()),
    }
}

impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>, LlmError> {
        let body = EmbedRequest::new(&self.model, text, task);
        let text = self.post("embedContent", &body).await?;
        let resp: EmbedResponse = serde_json::from_str(&text)?;
        non_empty(resp.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH) {
            tracing::debug!(size = chunk.len(), "embedding batch");
            out.extend(self.embed_chunk(chunk, task).await?);
        }
        same_dimension(&out)?;
        Ok(out)
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

impl<'a> EmbedRequest<'a> {
    fn new(model: &'a str, text: &'a str, task: EmbedTask) -> Self {
        Self {
            model,
            content: Content {
                parts: [Part { text }],
            },
            task_type: task_type(task),
        }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Values,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Values>,
}

#[derive(Deserialize)]
struct Values {
    #[serde(default)]
    values: Vec<f32>,
}
