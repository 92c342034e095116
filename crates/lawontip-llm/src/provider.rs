use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What the embedded text is used for. Hosted embedding models produce slightly
/// different vectors for stored passages and for search queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedTask {
    Document,
    Query,
}

/// Turns text into fixed-dimension vectors.
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding service rejects the request or is unreachable.
    fn embed(
        &self,
        text: &str,
        task: EmbedTask,
    ) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed several texts, preserving order. The default issues one request per text.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    fn embed_batch(
        &self,
        texts: &[String],
        task: EmbedTask,
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send {
        async move {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text, task).await?);
            }
            Ok(out)
        }
    }

    /// Embedding model identifier, recorded alongside persisted vectors.
    fn model(&self) -> &str;

    fn name(&self) -> &str;
}

/// Generates assistant replies from chat messages.
pub trait Completer: Send + Sync {
    /// Send messages and return the full assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn complete(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Send messages and return the response as a stream of text deltas.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be started.
    fn complete_stream(
        &self,
        messages: &[Message],
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;

    fn supports_streaming(&self) -> bool;

    fn model(&self) -> &str;

    fn name(&self) -> &str;
}
