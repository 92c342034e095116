use eventsource_stream::Eventsource;
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::ChatStream;

const DONE_MARKER: &str = "[DONE]";

/// Turn a chat-completions event stream into text deltas. Role-only events
/// and the `[DONE]` marker produce nothing.
pub(crate) fn chat_delta_stream(provider: String, response: reqwest::Response) -> ChatStream {
    let deltas = response
        .bytes_stream()
        .eventsource()
        .filter_map(move |event| match event {
            Ok(event) => parse_delta(&provider, &event.data),
            Err(e) => Some(Err(LlmError::SseParse(format!("{provider}: {e}")))),
        });
    Box::pin(deltas)
}

fn parse_delta(provider: &str, data: &str) -> Option<Result<String, LlmError>> {
    if data.trim() == DONE_MARKER {
        return None;
    }

    let chunk: DeltaChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(LlmError::SseParse(format!(
                "failed to parse SSE data from {provider}: {e}"
            ))));
        }
    };

    if let Some(err) = chunk.error {
        return Some(Err(LlmError::SseParse(format!(
            "{provider} stream error: {}",
            err.message
        ))));
    }
    if let Some(usage) = chunk.x_groq.and_then(|x| x.usage) {
        tracing::debug!(
            provider,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "stream usage"
        );
    }

    let choice = chunk.choices.into_iter().next()?;
    if choice.finish_reason.as_deref() == Some("length") {
        tracing::warn!(provider, "answer truncated at max_tokens");
    }
    choice
        .delta
        .content
        .filter(|text| !text.is_empty())
        .map(Ok)
}

#[derive(Deserialize)]
struct DeltaChunk {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
    #[serde(default)]
    error: Option<StreamError>,
    /// Groq reports token usage on the final chunk under this key.
    #[serde(default)]
    x_groq: Option<GroqExtension>,
}

#[derive(Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: String,
}

#[derive(Deserialize)]
struct GroqExtension {
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
