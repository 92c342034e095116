//! Configuration, prompt assembly, conversation state and the retrieval
//! pipeline behind the LAWONTIP assistant.

pub mod assistant;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod ingest;
pub mod prompt;
pub mod session;
pub mod vault;

pub use assistant::{Answer, Assistant, AssistantSettings};
pub use config::Config;
pub use error::{AssistantError, ConfigError};
pub use prompt::{Mode, PromptAssembler};
pub use session::{Conversation, Page, Session, Source, Turn};
