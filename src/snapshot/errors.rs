//! Snapshot error types
//!
//! Error codes:
//! - PREV_SNAPSHOT_UNREADABLE (FATAL severity)
//! - PREV_SNAPSHOT_IO (ERROR severity)
//! - PREV_SNAPSHOT_SERIALIZATION (ERROR severity)
//!
//! `PREV_SNAPSHOT_UNREADABLE` is the cross-format rejection: the newest
//! snapshot in the directory was written by a serializer the current
//! configuration does not know. Falling back to an older, readable
//! snapshot would silently resurrect stale state, so startup must abort.

use std::fmt;
use std::io;
use std::path::Path;

use crate::serializer::SerializationError;

/// Severity levels for snapshot errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The single operation fails; the engine continues.
    Error,
    /// Startup must abort.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Snapshot-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotErrorCode {
    /// Newest snapshot's format is not in the serializer registry
    Unreadable,
    /// I/O failure while reading or writing a snapshot
    Io,
    /// A strategy failed to encode or decode a snapshot
    Serialization,
}

impl SnapshotErrorCode {
    /// Returns the stable string code.
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotErrorCode::Unreadable => "PREV_SNAPSHOT_UNREADABLE",
            SnapshotErrorCode::Io => "PREV_SNAPSHOT_IO",
            SnapshotErrorCode::Serialization => "PREV_SNAPSHOT_SERIALIZATION",
        }
    }

    /// Returns the severity level for this error.
    pub fn severity(&self) -> Severity {
        match self {
            SnapshotErrorCode::Unreadable => Severity::Fatal,
            SnapshotErrorCode::Io => Severity::Error,
            SnapshotErrorCode::Serialization => Severity::Error,
        }
    }
}

impl fmt::Display for SnapshotErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Snapshot error with full context.
#[derive(Debug)]
pub struct SnapshotError {
    /// Error code
    code: SnapshotErrorCode,
    /// Human-readable message
    message: String,
    /// Underlying IO error if applicable
    io_source: Option<io::Error>,
    /// Underlying serialization error if applicable
    serialization_source: Option<SerializationError>,
}

impl SnapshotError {
    /// Cross-format rejection: the newest snapshot cannot be read by the
    /// current configuration. The message names the offending file and the
    /// suffixes this configuration supports.
    pub fn unreadable(path: &Path, supported_suffixes: &[&str]) -> Self {
        Self {
            code: SnapshotErrorCode::Unreadable,
            message: format!(
                "{} cannot be read; only [{}] supported",
                path.display(),
                supported_suffixes.join(", ")
            ),
            io_source: None,
            serialization_source: None,
        }
    }

    /// I/O failure with path context.
    pub fn io_at_path(path: &Path, message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SnapshotErrorCode::Io,
            message: format!("{}: {}", message.into(), path.display()),
            io_source: Some(source),
            serialization_source: None,
        }
    }

    /// A strategy failed to encode or decode a snapshot.
    pub fn serialization(message: impl Into<String>, source: SerializationError) -> Self {
        Self {
            code: SnapshotErrorCode::Serialization,
            message: message.into(),
            io_source: None,
            serialization_source: Some(source),
        }
    }

    /// Configuration failure: no strategy available to write with.
    pub fn no_primary_strategy() -> Self {
        Self {
            code: SnapshotErrorCode::Serialization,
            message: "no snapshot serializer registered".to_string(),
            io_source: None,
            serialization_source: None,
        }
    }

    /// Returns the error code.
    pub fn code(&self) -> SnapshotErrorCode {
        self.code
    }

    /// Returns the severity level.
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this error is fatal.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(ref e) = self.io_source {
            return Some(e);
        }
        if let Some(ref e) = self.serialization_source {
            return Some(e);
        }
        None
    }
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_unreadable_message_names_file_and_suffixes() {
        let path = PathBuf::from("/data/000000000000000000002.xmlsnapshot");
        let err = SnapshotError::unreadable(&path, &["snapshot", "altsnapshot"]);
        let message = err.message().to_string();
        assert!(message.contains("000000000000000000002.xmlsnapshot"));
        assert!(message.ends_with("cannot be read; only [snapshot, altsnapshot] supported"));
    }

    #[test]
    fn test_unreadable_is_fatal() {
        let path = PathBuf::from("000000000000000000002.xmlsnapshot");
        assert!(SnapshotError::unreadable(&path, &["snapshot"]).is_fatal());
    }

    #[test]
    fn test_io_is_not_fatal() {
        let err = SnapshotError::io_at_path(
            Path::new("/data"),
            "failed to read snapshot",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_fatal());
        assert_eq!(err.code(), SnapshotErrorCode::Io);
    }

    #[test]
    fn test_display_contains_code() {
        let err = SnapshotError::no_primary_strategy();
        assert!(format!("{}", err).contains("PREV_SNAPSHOT_SERIALIZATION"));
    }
}
