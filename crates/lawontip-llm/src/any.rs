use crate::error::LlmError;
use crate::gemini::GeminiEmbedder;
#[cfg(feature = "mock")]
use crate::mock::{MockCompleter, MockEmbedder};
use crate::openai::OpenAiProvider;
use crate::provider::{ChatStream, Completer, EmbedTask, Embedder, Message};

macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Gemini($p) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

macro_rules! delegate_completer {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyCompleter::OpenAi($p) => $expr,
            #[cfg(feature = "mock")]
            AnyCompleter::Mock($p) => $expr,
        }
    };
}

/// Concrete embedder chosen at startup.
#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Gemini(GeminiEmbedder),
    #[cfg(feature = "mock")]
    Mock(MockEmbedder),
}

/// Concrete chat completer chosen at startup.
#[derive(Debug, Clone)]
pub enum AnyCompleter {
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockCompleter),
}

impl Embedder for AnyEmbedder {
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>, LlmError> {
        delegate_embedder!(self, |p| p.embed(text, task).await)
    }

    async fn embed_batch(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_embedder!(self, |p| p.embed_batch(texts, task).await)
    }

    fn model(&self) -> &str {
        delegate_embedder!(self, |p| p.model())
    }

    fn name(&self) -> &str {
        delegate_embedder!(self, |p| p.name())
    }
}

impl Completer for AnyCompleter {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        delegate_completer!(self, |p| p.complete(messages).await)
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        delegate_completer!(self, |p| p.complete_stream(messages).await)
    }

    fn supports_streaming(&self) -> bool {
        delegate_completer!(self, |p| p.supports_streaming())
    }

    fn model(&self) -> &str {
        delegate_completer!(self, |p| p.model())
    }

    fn name(&self) -> &str {
        delegate_completer!(self, |p| p.name())
    }
}
