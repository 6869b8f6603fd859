use thiserror::Error;

/// Unified error types for the replay viewer
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Bootstrap failed for match {match_id}: {reason}")]
    Bootstrap { match_id: String, reason: String },

    #[error("Malformed event frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Event stream closed: {reason}")]
    StreamClosed { reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for replay operations
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Extension trait for converting foreign errors to ReplayError
pub trait ToReplayError<T> {
    fn to_replay_error(self, message: &str) -> ReplayResult<T>;
}

impl<T, E: std::fmt::Display> ToReplayError<T> for Result<T, E> {
    fn to_replay_error(self, message: &str) -> ReplayResult<T> {
        self.map_err(|e| ReplayError::Internal {
            message: format!("{}: {}", message, e),
        })
    }
}

/// Helper functions for common error scenarios
impl ReplayError {
    pub fn bootstrap_failed(match_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Bootstrap {
            match_id: match_id.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    pub fn stream_closed(reason: impl Into<String>) -> Self {
        Self::StreamClosed {
            reason: reason.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 스트림/전송 계층에서 발생한 오류인지 여부
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ReplayError::Http(_) | ReplayError::Io(_) | ReplayError::StreamClosed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors_render_messages() {
        let err = ReplayError::bootstrap_failed("m-1", "match lookup returned 404");
        assert_eq!(
            err.to_string(),
            "Bootstrap failed for match m-1: match lookup returned 404"
        );

        let err = ReplayError::malformed_frame("missing type");
        assert_eq!(err.to_string(), "Malformed event frame: missing type");
        assert!(!err.is_transport());

        assert!(ReplayError::stream_closed("eof").is_transport());
    }

    #[test]
    fn test_to_replay_error_wraps_display() {
        let res: Result<(), String> = Err("boom".to_string());
        let err = res.to_replay_error("decoding roster").unwrap_err();
        assert_eq!(err.to_string(), "Internal error: decoding roster: boom");
    }
}
