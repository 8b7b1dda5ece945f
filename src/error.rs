//! Error types for talkwire.

use thiserror::Error;

/// Boxed error produced by application handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for registration and dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler or route was rejected at registration time.
    #[error("invalid handler configuration: {0}")]
    Configuration(String),

    /// The payload does not encode a value of the declared parameter type.
    #[error("unexpected parameter type: {0}")]
    Decode(#[source] serde_json::Error),

    /// A handler result could not be encoded.
    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    /// Error returned by the application handler itself.
    #[error("{0}")]
    Handler(BoxError),

    /// No exact or fallback handler is registered for the name.
    #[error("no handler registered for {0:?}")]
    HandlerNotFound(String),

    /// Misuse of the dispatch or stream contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The outbound side of a connection or stream is gone.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl DispatchError {
    /// Wrap an application error.
    pub fn handler<E: Into<BoxError>>(err: E) -> Self {
        DispatchError::Handler(err.into())
    }

    /// Whether this error came from payload decoding.
    pub fn is_decode(&self) -> bool {
        matches!(self, DispatchError::Decode(_))
    }

    /// Whether this error was returned by the application handler.
    pub fn is_handler(&self) -> bool {
        matches!(self, DispatchError::Handler(_))
    }
}

/// Result type alias using DispatchError.
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display_is_verbatim() {
        let err = DispatchError::handler("name must not be empty");
        assert_eq!(err.to_string(), "name must not be empty");
        assert!(err.is_handler());
        assert!(!err.is_decode());
    }

    #[test]
    fn test_decode_error_keeps_source() {
        let source = serde_json::from_slice::<u32>(b"\"x\"").unwrap_err();
        let err = DispatchError::Decode(source);
        assert!(err.is_decode());
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("unexpected parameter type"));
    }
}
