use thiserror::Error;

/// Failures at the network boundary, already classified for retry decisions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Credential missing, invalid or expired; needs a new sign-in
    #[error("credential was refused by the review service")]
    Unauthorized,
    /// Network trouble or a server-side failure; safe to retry
    #[error("review service unavailable: {0}")]
    Transient(String),
    /// The server refused the review content
    #[error("review rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        // Transport, timeout and body decoding problems alike; the
        // idempotency key makes a repeat harmless.
        RemoteError::Transient(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(RemoteError::Transient("503".to_string()).is_retryable());
        assert!(!RemoteError::Unauthorized.is_retryable());
        assert!(!RemoteError::Rejected("profanity".to_string()).is_retryable());
    }

    #[test]
    fn test_rejected_message_is_verbatim() {
        let e = RemoteError::Rejected("profanity".to_string());
        assert_eq!(e.to_string(), "review rejected: profanity");
    }
}
