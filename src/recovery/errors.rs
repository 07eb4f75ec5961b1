//! Recovery error types
//!
//! Every recovery-time failure is fatal for startup: the engine either
//! recovers a fully consistent state or refuses to start. The source
//! taxonomy is preserved so callers can distinguish a cross-format
//! snapshot rejection from journal corruption or plain I/O.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::journal::JournalError;
use crate::serializer::SerializationError;
use crate::snapshot::SnapshotError;

/// Error aborting engine startup.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Snapshot discovery, selection, or load failed. Includes the
    /// cross-format rejection of an unreadable newest snapshot.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Journal enumeration or replay failed.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// The transient deep copy could not round-trip the initial system,
    /// or a journaled transaction could not be decoded.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// The storage directory could not be created or accessed.
    #[error("failed to prepare storage directory {directory:?}: {source}")]
    Directory {
        directory: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;
