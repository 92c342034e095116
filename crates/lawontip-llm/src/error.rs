/// Coarse classification used by callers to decide between retrying, halting and
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Transient,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} rejected the API key")]
    Unauthorized { provider: String },

    #[error("{provider} rate limited")]
    RateLimited { provider: String },

    #[error("{provider} temporarily unavailable: {reason}")]
    Transient { provider: String, reason: String },

    #[error("{provider} request timed out")]
    Timeout { provider: String },

    #[error("{provider} API request failed (status {status})")]
    Api { provider: String, status: u16 },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("SSE parse error: {0}")]
    SseParse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether a bounded retry may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transient { .. } | Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        if matches!(self, Self::Unauthorized { .. }) {
            ErrorKind::Authentication
        } else if self.is_transient() {
            ErrorKind::Transient
        } else {
            ErrorKind::Other
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_authentication_kind() {
        let err = LlmError::Unauthorized {
            provider: "groq".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "groq rejected the API key");
    }

    #[test]
    fn rate_limit_and_timeout_are_transient() {
        assert!(
            LlmError::RateLimited {
                provider: "gemini".into()
            }
            .is_transient()
        );
        assert!(
            LlmError::Timeout {
                provider: "gemini".into()
            }
            .is_transient()
        );
        assert_eq!(
            LlmError::Transient {
                provider: "groq".into(),
                reason: "status 503".into()
            }
            .kind(),
            ErrorKind::Transient
        );
    }

    #[test]
    fn api_error_is_not_retried() {
        let err = LlmError::Api {
            provider: "groq".into(),
            status: 400,
        };
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(err.to_string().contains("status 400"));
    }
}
