use thiserror::Error;

/// Failures surfaced by the chat relay.
///
/// Every variant is reported back to the originating connection as an
/// `error` event; none of them is allowed to take down other connections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authorization error: {0}")]
    Authorization(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl ChatError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "validation_error",
            ChatError::Authorization(_) => "authorization_error",
            ChatError::NotFound(_) => "not_found",
            ChatError::Conflict(_) => "conflict",
            ChatError::Persistence(_) => "persistence_error",
        }
    }

    /// Message safe to show to end users. Store details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ChatError::Persistence(_) => "Something went wrong, please try again".to_string(),
            ChatError::Validation(msg)
            | ChatError::Authorization(msg)
            | ChatError::NotFound(msg)
            | ChatError::Conflict(msg) => msg.clone(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ChatError::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ChatError::Authorization(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ChatError::NotFound(msg.into())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ChatError::validation("x").code(), "validation_error");
        assert_eq!(ChatError::unauthorized("x").code(), "authorization_error");
        assert_eq!(ChatError::not_found("x").code(), "not_found");
        assert_eq!(ChatError::Conflict("x".into()).code(), "conflict");
        assert_eq!(ChatError::Persistence("x".into()).code(), "persistence_error");
    }

    #[test]
    fn test_persistence_details_are_hidden() {
        let err = ChatError::Persistence("disk I/O error at page 12".to_string());
        assert!(!err.public_message().contains("disk"));

        let err = ChatError::validation("Message cannot be empty");
        assert_eq!(err.public_message(), "Message cannot be empty");
    }
}
