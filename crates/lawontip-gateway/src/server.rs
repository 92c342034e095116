use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lawontip_core::Assistant;
use lawontip_llm::any::{AnyCompleter, AnyEmbedder};
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;
use crate::session::SessionStore;

pub type SharedAssistant = Arc<Assistant<AnyEmbedder, AnyCompleter>>;

#[derive(Clone)]
pub struct AppState {
    pub assistant: SharedAssistant,
    pub sessions: SessionStore,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(assistant: SharedAssistant, session_ttl: Duration) -> Self {
        Self {
            assistant,
            sessions: SessionStore::new(session_ttl),
            started_at: Instant::now(),
        }
    }
}

pub struct GatewayServer {
    host: String,
    port: u16,
    rate_limit: u32,
    max_body_size: usize,
    session_ttl: Duration,
    assistant: SharedAssistant,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        assistant: SharedAssistant,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            rate_limit: 60,
            max_body_size: 65_536,
            session_ttl: Duration::from_secs(1800),
            assistant,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Address the server will listen on. The host may be an IP literal or a
    /// name such as `localhost`; the first resolved address wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not resolve.
    pub async fn addr(&self) -> Result<SocketAddr, GatewayError> {
        let raw = format!("{}:{}", self.host, self.port);
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| GatewayError::Address(raw.clone(), e))?;
        addrs.next().ok_or_else(|| {
            GatewayError::Address(
                raw,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
            )
        })
    }

    /// Serve the web interface until the shutdown signal fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, binding fails, or the server
    /// hits a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let addr = self.addr().await?;
        if addr.ip().is_unspecified() {
            tracing::warn!("web interface listening on all interfaces ({addr})");
        }

        let state = AppState::new(self.assistant, self.session_ttl);
        let router = build_router(state, self.rate_limit, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(addr.to_string(), e))?;
        tracing::info!("LAWONTIP available at http://{addr}");

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("web interface shutting down");
        })
        .await
        .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}
