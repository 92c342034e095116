//! Embedding and chat-completion capabilities backed by hosted APIs.

pub mod any;
pub mod error;
pub mod gemini;
pub(crate) mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub(crate) mod retry;
pub(crate) mod sse;

pub use error::{ErrorKind, LlmError};
pub use provider::{ChatStream, Completer, EmbedTask, Embedder, Message, Role};
