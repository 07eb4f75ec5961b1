//! Serialization error type
//!
//! Error code:
//! - PREV_SERIALIZATION (ERROR severity)
//!
//! A serialization failure is fatal for the single operation that
//! triggered it (snapshot write, snapshot load, or journal append); it
//! never corrupts previously-durable state.

use std::fmt;

/// Error raised by a serializer strategy or the strategy registry.
#[derive(Debug)]
pub struct SerializationError {
    /// Human-readable message
    message: String,
    /// Underlying serializer error if applicable
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SerializationError {
    /// Create an error for a failed encode.
    pub fn encode(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: format!("failed to serialize {}", context.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Create an error for a failed decode.
    pub fn decode(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: format!("failed to deserialize {}", context.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Create an error with a bare message (registry misconfiguration,
    /// strategy-specific validation failures).
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &'static str {
        "PREV_SERIALIZATION"
    }

    /// Returns the error message.
    pub fn message_text(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code(), self.message)?;
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type for serializer operations
pub type SerializationResult<T> = Result<T, SerializationError>;
