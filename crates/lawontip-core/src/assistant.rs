//! The query pipeline: embed, search, assemble, complete.

use std::sync::Arc;

use lawontip_llm::{ChatStream, Completer, EmbedTask, Embedder, LlmError};
use lawontip_memory::{ScoredVectorPoint, VectorStore};
use serde::Serialize;

use crate::config::Config;
use crate::error::AssistantError;
use crate::prompt::{AssembledPrompt, Mode, PromptAssembler};
use crate::session::{Conversation, Source, Turn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSettings {
    pub top_k: usize,
    pub history_window: usize,
    pub budget_tokens: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AssistantSettings {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            history_window: config.memory.history_window,
            budget_tokens: config.prompt.budget_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

/// A prompt ready to send, with the sources it cites.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub prompt: AssembledPrompt,
    pub sources: Vec<Source>,
}

pub struct Assistant<E, C> {
    embedder: E,
    completer: C,
    store: Arc<dyn VectorStore>,
    assembler: PromptAssembler,
    settings: AssistantSettings,
}

impl<E: Embedder, C: Completer> Assistant<E, C> {
    #[must_use]
    pub fn new(embedder: E, completer: C, store: Arc<dyn VectorStore>, settings: AssistantSettings) -> Self {
        Self {
            embedder,
            completer,
            store,
            assembler: PromptAssembler::new(settings.budget_tokens),
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    /// Number of chunks in the index.
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.store.len()
    }

    /// Embed the query and return the `top_k` most similar chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the index search fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredVectorPoint>, AssistantError> {
        let vector = self
            .embedder
            .embed(query, EmbedTask::Query)
            .await
            .map_err(AssistantError::Embedding)?;
        let hits = self.store.search(vector, self.settings.top_k).await?;
        tracing::debug!(
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved passages"
        );
        Ok(hits)
    }

    /// Retrieve and assemble the prompt for `message` against the recent history.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub async fn prepare(
        &self,
        mode: Mode,
        message: &str,
        conversation: &Conversation,
    ) -> Result<PreparedTurn, AssistantError> {
        let hits = self.retrieve(message).await?;
        let history = conversation.recent(self.settings.history_window);
        let prompt = self.assembler.assemble(mode, message, &hits, &history);
        let used = &hits[..prompt.chunks_used];
        let sources = Source::from_chunks(used.iter().map(|h| (&h.payload, h.score)));
        Ok(PreparedTurn { prompt, sources })
    }

    /// Run the whole pipeline and return the model's answer.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails.
    pub async fn answer(
        &self,
        mode: Mode,
        message: &str,
        conversation: &Conversation,
    ) -> Result<Answer, AssistantError> {
        let prepared = self.prepare(mode, message, conversation).await?;
        let text = self
            .completer
            .complete(&prepared.prompt.messages)
            .await
            .map_err(AssistantError::Completion)?;
        Ok(Answer {
            text,
            sources: prepared.sources,
        })
    }

    /// Like [`Self::answer`] but yields the reply as text deltas. Sources are
    /// known before the first delta arrives. A completer without streaming
    /// support yields the whole reply as a single delta.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails or the stream cannot be started.
    pub async fn answer_stream(
        &self,
        mode: Mode,
        message: &str,
        conversation: &Conversation,
    ) -> Result<(ChatStream, Vec<Source>), AssistantError> {
        let prepared = self.prepare(mode, message, conversation).await?;
        let messages = &prepared.prompt.messages;
        let stream: ChatStream = if self.completer.supports_streaming() {
            self.completer
                .complete_stream(messages)
                .await
                .map_err(AssistantError::Completion)?
        } else {
            let text = self
                .completer
                .complete(messages)
                .await
                .map_err(AssistantError::Completion)?;
            Box::pin(tokio_stream::once(Ok::<_, LlmError>(text)))
        };
        Ok((stream, prepared.sources))
    }

    /// Answer `message` and append the turn to `conversation`. Failures become
    /// an error turn carrying a readable message.
    pub async fn respond(&self, conversation: &mut Conversation, mode: Mode, message: &str) -> Turn {
        let turn = match self.answer(mode, message, conversation).await {
            Ok(answer) => {
                tracing::info!(mode = %mode, sources = answer.sources.len(), "answered");
                answered_turn(mode, message, answer.text, answer.sources)
            }
            Err(e) => {
                tracing::error!(mode = %mode, "query failed: {e:#}");
                failed_turn(mode, message, &e)
            }
        };
        conversation.push(turn.clone());
        turn
    }
}

#[must_use]
pub fn answered_turn(mode: Mode, message: &str, text: String, sources: Vec<Source>) -> Turn {
    Turn {
        user: message.to_owned(),
        assistant: text,
        mode,
        sources,
        is_error: false,
    }
}

#[must_use]
pub fn failed_turn(mode: Mode, message: &str, error: &AssistantError) -> Turn {
    Turn {
        user: message.to_owned(),
        assistant: error.user_message(),
        mode,
        sources: Vec::new(),
        is_error: true,
    }
}
