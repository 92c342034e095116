//! Test doubles for the embedding and completion capabilities.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatStream, Completer, EmbedTask, Embedder, Message};

/// Which error a failing double returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Unauthorized,
    Transient,
    Other,
}

impl MockFailure {
    fn to_error(self) -> LlmError {
        match self {
            Self::Unauthorized => LlmError::Unauthorized {
                provider: "mock".into(),
            },
            Self::Transient => LlmError::Transient {
                provider: "mock".into(),
                reason: "status 503 Service Unavailable".into(),
            },
            Self::Other => LlmError::Other("mock LLM error".into()),
        }
    }
}

/// Deterministic bag-of-words embedder: every lowercase alphanumeric token is
/// hashed into one of `dimension` buckets and the result is L2-normalised, so
/// texts sharing words have a high cosine similarity.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    pub failure: Option<MockFailure>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn failing(failure: MockFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    /// Number of texts embedded so far, across clones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str, _task: EmbedTask) -> Result<Vec<f32>, LlmError> {
        if let Some(failure) = self.failure {
            return Err(failure.to_error());
        }
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.vector_for(text))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn model(&self) -> &str {
        "mock-embedding"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

/// Scripted chat completer. Replies are taken from the queue in order, then
/// `default_response` is repeated. Every request is recorded.
#[derive(Debug, Clone)]
pub struct MockCompleter {
    responses: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub failure: Option<MockFailure>,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
    pub streaming: bool,
}

impl Default for MockCompleter {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            failure: None,
            delay_ms: 0,
            streaming: true,
        }
    }
}

impl MockCompleter {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing(failure: MockFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Report no streaming support; `complete_stream` then fails.
    #[must_use]
    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    /// Messages of every request received so far, across clones.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

impl Completer for MockCompleter {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if let Some(failure) = self.failure {
            return Err(failure.to_error());
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        if !self.streaming {
            return Err(LlmError::Other("mock completer does not stream".into()));
        }
        let response = self.complete(messages).await?;
        let chunks: Vec<_> = response
            .split_inclusive(' ')
            .map(|w| Ok(w.to_owned()))
            .collect();
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn model(&self) -> &str {
        "mock-chat"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn similar_texts_score_higher() {
        let e = MockEmbedder::default();
        let q = e.embed("section 420 cheating", EmbedTask::Query).await.unwrap();
        let hit = e
            .embed("Section 420 deals with cheating", EmbedTask::Document)
            .await
            .unwrap();
        let miss = e
            .embed("marriage registration procedure", EmbedTask::Document)
            .await
            .unwrap();
        assert!(cosine(&q, &hit) > cosine(&q, &miss));
        assert_eq!(e.calls(), 3);
    }

    #[tokio::test]
    async fn embedding_is_normalised_and_deterministic() {
        let e = MockEmbedder::new(16);
        let a = e.vector_for("the quick brown fox");
        let b = e.vector_for("the quick brown fox");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn failing_embedder_returns_configured_error() {
        let e = MockEmbedder::failing(MockFailure::Unauthorized);
        let err = e.embed("x", EmbedTask::Query).await.unwrap_err();
        assert!(matches!(err, LlmError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn completer_replays_script_then_default() {
        let c = MockCompleter::with_responses(vec!["first".into()]);
        assert_eq!(c.complete(&[Message::user("a")]).await.unwrap(), "first");
        assert_eq!(c.complete(&[Message::user("b")]).await.unwrap(), "mock response");
        let requests = c.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1][0].content, "b");
    }

    #[tokio::test]
    async fn completer_streams_words() {
        let c = MockCompleter::with_responses(vec!["one two three".into()]);
        let stream = c.complete_stream(&[Message::user("q")]).await.unwrap();
        let parts: Vec<String> = stream.map(Result::unwrap).collect().await;
        assert_eq!(parts, vec!["one ", "two ", "three"]);
    }

    #[tokio::test]
    async fn non_streaming_completer_refuses_streams() {
        let c = MockCompleter::default().without_streaming();
        assert!(!c.supports_streaming());
        assert!(c.complete_stream(&[Message::user("q")]).await.is_err());
        assert_eq!(c.complete(&[Message::user("q")]).await.unwrap(), "mock response");
    }

    #[tokio::test]
    async fn failing_completer_is_transient() {
        let c = MockCompleter::failing(MockFailure::Transient);
        let err = c.complete(&[Message::user("q")]).await.unwrap_err();
        assert!(err.is_transient());
    }
}
