//! Engine-level error type
//!
//! Aggregates the per-subsystem errors behind one surface for callers of
//! the prevalence engine. Recovery-time failures abort startup; runtime
//! failures are scoped to the single `execute` or `take_snapshot` call
//! that triggered them and never corrupt previously-durable state.

use thiserror::Error;

use crate::journal::JournalError;
use crate::recovery::RecoveryError;
use crate::serializer::SerializationError;
use crate::snapshot::SnapshotError;

/// Error surfaced by the prevalence engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was misconfigured (missing directory, invalid suffix).
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// The engine has been closed; no further transactions or snapshots
    /// are accepted.
    #[error("engine is closed")]
    Closed,

    /// Startup recovery failed; no engine was constructed.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Snapshot write failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Journal append or fsync failed.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// A transaction or system could not be serialized.
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
