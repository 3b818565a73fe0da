use thiserror::Error;

/// Everything that can go wrong talking to the bot backend. None of these are
/// fatal: call sites turn them into display strings.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}")]
    Status { status: u16, detail: Option<String> },

    #[error("malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("request abandoned after shutdown")]
    Cancelled,

    #[error("another command is still in progress")]
    Busy,
}

impl BackendError {
    /// Server-provided error text when there is one, otherwise the error itself.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Status { detail: Some(detail), .. } => detail.clone(),
            BackendError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackendError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_and_detail() {
        let err = BackendError::Status { status: 400, detail: Some("Invalid trade type".to_string()) };
        assert_eq!(err.to_string(), "HTTP error! status: 400");
        assert_eq!(err.user_message(), "Invalid trade type");

        let bare = BackendError::Status { status: 502, detail: None };
        assert_eq!(bare.user_message(), "HTTP error! status: 502");
    }

    #[test]
    fn test_decode_error_names_endpoint() {
        let source = serde_json::from_str::<i32>("nope").unwrap_err();
        let err = BackendError::Decode { endpoint: "/api/metrics", source };
        assert!(err.to_string().starts_with("malformed response from /api/metrics"));
        assert!(!err.is_cancelled());
        assert!(BackendError::Cancelled.is_cancelled());
    }
}
