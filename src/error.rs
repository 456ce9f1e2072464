// ⚠️ Error Taxonomy - One flat error type shared by client and backend
//
// The client never distinguishes retryable from fatal errors: every variant
// ends up as a single blocking alert, so the only thing that matters to the
// UI is `alert_message()`.

use thiserror::Error;

/// Shown when neither the error nor the server supplied a message
pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport failure (connection refused, timeout, unreadable body)
    #[error("Network error: {0}")]
    Network(String),

    /// Required field missing, caught before anything is sent
    #[error("{field} is required")]
    Validation { field: String },

    /// The envelope came back with a non-success status
    #[error("{}", .message.as_deref().unwrap_or(FALLBACK_MESSAGE))]
    Rejected { message: Option<String> },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    /// Plan quota used up
    #[error("Your {0} limit is exhausted, please upgrade your package")]
    LimitExhausted(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &str) -> Self {
        ApiError::Validation {
            field: field.to_string(),
        }
    }

    pub fn rejected(message: Option<String>) -> Self {
        ApiError::Rejected {
            message: message.filter(|m| !m.trim().is_empty()),
        }
    }

    /// Message for the blocking alert dialog.
    ///
    /// Picks the error's own message first, then the server's message, then
    /// the hardcoded fallback.
    pub fn alert_message(&self) -> String {
        match self {
            ApiError::Rejected { message } => message
                .clone()
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            ApiError::Storage(_) | ApiError::Internal(_) => FALLBACK_MESSAGE.to_string(),
            other => {
                let msg = other.to_string();
                if msg.trim().is_empty() {
                    FALLBACK_MESSAGE.to_string()
                } else {
                    msg
                }
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_without_message_uses_fallback() {
        let err = ApiError::rejected(None);
        assert_eq!(err.alert_message(), FALLBACK_MESSAGE);

        let blank = ApiError::rejected(Some("   ".to_string()));
        assert_eq!(blank.alert_message(), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_rejected_prefers_server_message() {
        let err = ApiError::rejected(Some("Profile not approved yet".to_string()));
        assert_eq!(err.alert_message(), "Profile not approved yet");
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = ApiError::validation("firstName");
        assert_eq!(err.alert_message(), "firstName is required");
    }

    #[test]
    fn test_storage_errors_are_not_leaked() {
        let err = ApiError::Storage(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.alert_message(), FALLBACK_MESSAGE);
    }
}
