use serde_json::Value;

/// Longest message shown to a user for a failed request.
pub const USER_MESSAGE_LIMIT: usize = 400;

/// Detail fragment the pipeline runner uses when a method node lacks input.
pub const REQUIRES_RECEIVER_DETAIL: &str = "requires 'self'";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Builds an HTTP error from a response body: a JSON `detail` field when
    /// present, otherwise the raw text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| match value.get("detail") {
                Some(Value::String(detail)) => Some(detail.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_else(|| body.to_string());
        Self::Http { status, detail }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Http { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// The backend refused to run a method node with no receiver.
    pub fn requires_receiver(&self) -> bool {
        self.detail()
            .is_some_and(|detail| detail.contains(REQUIRES_RECEIVER_DETAIL))
    }

    /// Message for display, cut to [`USER_MESSAGE_LIMIT`] characters.
    pub fn user_message(&self) -> String {
        self.to_string().chars().take(USER_MESSAGE_LIMIT).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_response_json_detail_expected_detail_field() {
        let error = BackendError::from_response(
            400,
            r#"{"detail":"Node 'b' (DataFrame.head) requires 'self' (a DataFrame/Series)"}"#,
        );
        assert!(error.requires_receiver());
        assert_eq!(
            error.detail(),
            Some("Node 'b' (DataFrame.head) requires 'self' (a DataFrame/Series)")
        );
    }

    #[test]
    fn from_response_plain_text_expected_body() {
        let error = BackendError::from_response(502, "Bad Gateway");
        assert_eq!(error.to_string(), "HTTP 502: Bad Gateway");
        assert!(!error.requires_receiver());
    }

    #[test]
    fn user_message_long_detail_expected_truncated() {
        let error = BackendError::Http {
            status: 500,
            detail: "x".repeat(1000),
        };
        assert_eq!(error.user_message().chars().count(), USER_MESSAGE_LIMIT);
    }
}
