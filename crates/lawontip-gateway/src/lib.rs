//! Web chat interface for the LAWONTIP assistant: landing and chat pages,
//! JSON and SSE endpoints, per-browser sessions and a health endpoint.

mod error;
mod handlers;
mod render;
mod router;
mod server;
mod session;

pub use error::GatewayError;
pub use router::build_router;
pub use server::{AppState, GatewayServer, SharedAssistant};
pub use session::{SESSION_COOKIE, SessionStore};
