use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cannot resolve listen address {0}: {1}")]
    Address(String, std::io::Error),
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("web server error: {0}")]
    Server(String),
}
