//! Prompt assembly for both chat modes.

use std::fmt::Write;
use std::str::FromStr;

use lawontip_llm::Message;
use lawontip_memory::ScoredVectorPoint;
use serde::{Deserialize, Serialize};

use crate::session::Turn;

const QUESTION_INSTRUCTION: &str = "\
As a legal chatbot specializing in Indian law, provide accurate and concise information based on \
the user's questions. Focus on relevant context from the knowledge base while avoiding unnecessary \
details. Your responses should be brief, professional, and contextually relevant. If a question \
falls outside the given context, rely on your knowledge base to generate an appropriate response. \
Prioritize the user's query and deliver precise information pertaining to Indian legal system.";

const SCENARIO_INSTRUCTION: &str = "\
You are a legal expert chatbot specializing in Indian law. When a user describes a scenario, \
analyze it, identify the relevant legal issue, and provide the most applicable law, section, or \
rule from the Indian legal context. Use the provided context from the knowledge base to support \
your answer. If the scenario involves exceptions (such as self-defense), explain the relevant law \
and its application concisely.";

const NO_CONTEXT: &str = "(no relevant passages found)";
const NO_HISTORY: &str = "(none)";

/// How the user's message is framed for the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Question,
    Scenario,
}

impl Mode {
    pub const ALL: [Self; 2] = [Self::Question, Self::Scenario];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Scenario => "scenario",
        }
    }

    /// Label shown in the mode selector.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Question => "Ask a legal question",
            Self::Scenario => "Describe a scenario",
        }
    }

    #[must_use]
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Question => QUESTION_INSTRUCTION,
            Self::Scenario => SCENARIO_INSTRUCTION,
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Self::Question => "QUESTION",
            Self::Scenario => "SCENARIO",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "question" => Ok(Self::Question),
            "scenario" => Ok(Self::Scenario),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Estimate token count using chars/4 heuristic.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub messages: Vec<Message>,
    /// Number of leading retrieved chunks that made it into the prompt.
    pub chunks_used: usize,
    /// Number of most recent history turns that made it into the prompt.
    pub turns_used: usize,
    pub estimated_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    budget_tokens: usize,
}

impl PromptAssembler {
    #[must_use]
    pub fn new(budget_tokens: usize) -> Self {
        Self { budget_tokens }
    }

    /// Build the system and user messages for one turn.
    ///
    /// `chunks` must be in ranking order and `history` oldest first. Over
    /// budget, the oldest turns are dropped first, then the lowest-ranked
    /// chunks. The message itself and the top chunk are always kept.
    #[must_use]
    pub fn assemble(
        &self,
        mode: Mode,
        message: &str,
        chunks: &[ScoredVectorPoint],
        history: &[Turn],
    ) -> AssembledPrompt {
        let mut first_turn = 0;
        let mut chunk_count = chunks.len();

        loop {
            let messages = vec![
                Message::system(mode.instruction()),
                Message::user(user_message(
                    mode,
                    message,
                    &chunks[..chunk_count],
                    &history[first_turn..],
                )),
            ];
            let estimated_tokens = messages.iter().map(|m| estimate_tokens(&m.content)).sum();

            if estimated_tokens <= self.budget_tokens {
                return self.done(messages, chunk_count, history.len() - first_turn, estimated_tokens);
            }
            if first_turn < history.len() {
                first_turn += 1;
            } else if chunk_count > 1 {
                chunk_count -= 1;
            } else {
                tracing::warn!(
                    estimated_tokens,
                    budget = self.budget_tokens,
                    "prompt exceeds budget with only the message and top passage"
                );
                return self.done(messages, chunk_count, 0, estimated_tokens);
            }
        }
    }

    fn done(
        &self,
        messages: Vec<Message>,
        chunks_used: usize,
        turns_used: usize,
        estimated_tokens: usize,
    ) -> AssembledPrompt {
        tracing::debug!(
            chunks_used,
            turns_used,
            estimated_tokens,
            budget = self.budget_tokens,
            "prompt assembled"
        );
        AssembledPrompt {
            messages,
            chunks_used,
            turns_used,
            estimated_tokens,
        }
    }
}

fn user_message(mode: Mode, message: &str, chunks: &[ScoredVectorPoint], history: &[Turn]) -> String {
    let mut out = String::from("CONTEXT:\n");
    if chunks.is_empty() {
        out.push_str(NO_CONTEXT);
    }
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "[{}]\n{}", chunk.payload.citation(), chunk.payload.text.trim());
    }

    out.push_str("\n\nCHAT HISTORY:\n");
    if history.is_empty() {
        out.push_str(NO_HISTORY);
    }
    for (i, turn) in history.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "Human: {}\nAssistant: {}", turn.user, turn.assistant);
    }

    let _ = write!(out, "\n\n{}: {message}\n\nANSWER:", mode.heading());
    out
}
