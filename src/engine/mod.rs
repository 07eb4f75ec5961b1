//! Prevalence engine
//!
//! Owns the recovered prevalent system and enforces the two disciplines
//! that make deterministic replay possible:
//!
//! - **Single writer**: transaction execution and snapshot-taking are
//!   serialized behind one mutex, so journal order always equals
//!   application order.
//! - **Write-ahead ordering**: a transaction is appended and fsynced to
//!   the journal before it is applied to the in-memory system.
//!
//! Queries run concurrently with each other but take the system read
//! lock, so they never observe a transaction mid-application.

mod errors;

pub use errors::{EngineError, EngineResult};

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::journal::JournalWriter;
use crate::recovery::{self, Recovered};
use crate::serializer::{JsonSerializer, SerializationError, Serializer, SerializerRegistry};
use crate::snapshot::SnapshotManager;

/// Default suffix for the built-in JSON snapshot strategy.
pub const DEFAULT_SNAPSHOT_SUFFIX: &str = "snapshot";

/// A deterministic, serializable command that mutates the prevalent
/// system.
///
/// Transactions are journaled before they are applied and re-executed
/// verbatim during recovery, so `apply` must depend only on the
/// transaction's own fields and the current system state.
pub trait Transaction<S>: Serialize + DeserializeOwned {
    /// Apply this transaction to the system.
    fn apply(&self, system: &mut S);
}

/// Configures and recovers a [`PrevalenceEngine`].
///
/// Mirrors the lifecycle of the engine itself: everything is decided
/// before `build`, and the registry is immutable afterwards.
pub struct EngineBuilder<S, T> {
    initial: S,
    directory: Option<PathBuf>,
    serializers: Vec<(String, Box<dyn Serializer<S>>)>,
    transient: bool,
    _transaction: PhantomData<fn() -> T>,
}

impl<S, T> EngineBuilder<S, T> {
    /// Starts a builder around the initial prevalent system, used when no
    /// snapshot exists yet.
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            directory: None,
            serializers: Vec::new(),
            transient: false,
            _transaction: PhantomData,
        }
    }

    /// Sets the storage directory. Required unless the engine is
    /// transient.
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Registers a snapshot serializer under a suffix. The first
    /// registered strategy is the primary one and writes all new
    /// snapshots; later ones only read historical formats.
    pub fn serializer(
        mut self,
        suffix: impl Into<String>,
        strategy: impl Serializer<S> + 'static,
    ) -> Self {
        self.serializers.push((suffix.into(), Box::new(strategy)));
        self
    }

    /// Switches the engine to transient mode: no journal, no snapshots,
    /// state lives only in memory. The initial system is deep-copied so
    /// its identity never leaks into the engine.
    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Builds the engine with the configured serializers.
    ///
    /// Unlike [`build`](Self::build), this never installs a default
    /// strategy, so it carries no serde bounds on the system type; at
    /// least one serializer must have been registered.
    pub fn build_configured(self) -> EngineResult<PrevalenceEngine<S, T>>
    where
        T: Transaction<S>,
    {
        let mut registry = SerializerRegistry::new();
        for (suffix, strategy) in self.serializers {
            registry
                .register_boxed(suffix, strategy)
                .map_err(EngineError::Serialization)?;
        }
        if registry.is_empty() {
            return Err(EngineError::Config(
                "no snapshot serializer registered".to_string(),
            ));
        }

        if self.transient {
            let recovered = recovery::recover_transient(&registry, &self.initial)?;
            return Ok(PrevalenceEngine::from_recovered(recovered, registry, None));
        }

        let directory = self.directory.ok_or_else(|| {
            EngineError::Config("a persistent engine requires a storage directory".to_string())
        })?;
        let recovered = recovery::recover::<S, T>(&directory, &registry, self.initial)?;
        Ok(PrevalenceEngine::from_recovered(
            recovered,
            registry,
            Some(directory),
        ))
    }
}

impl<S, T> EngineBuilder<S, T>
where
    S: Serialize + DeserializeOwned,
{
    /// Builds the engine, installing the built-in JSON strategy under the
    /// `snapshot` suffix when no serializer was configured.
    pub fn build(mut self) -> EngineResult<PrevalenceEngine<S, T>>
    where
        T: Transaction<S>,
    {
        if self.serializers.is_empty() {
            self = self.serializer(DEFAULT_SNAPSHOT_SUFFIX, JsonSerializer::new());
        }
        self.build_configured()
    }
}

/// Guarded by the writer mutex: the watermark and the journal handle
/// advance together, in journal order.
struct WriterState {
    /// Sequence number of the last committed event (0 before any)
    sequence: u64,
    /// Journal writer; `None` in transient mode and after close
    journal: Option<JournalWriter>,
    /// Whether `close` has been called
    closed: bool,
}

/// The prevalence engine: owns the live system, journals transactions
/// before applying them, and takes snapshots on request.
pub struct PrevalenceEngine<S, T> {
    system: RwLock<S>,
    writer: Mutex<WriterState>,
    registry: SerializerRegistry<S>,
    directory: Option<PathBuf>,
    _transaction: PhantomData<fn() -> T>,
}

impl<S, T> PrevalenceEngine<S, T>
where
    T: Transaction<S>,
{
    fn from_recovered(
        recovered: Recovered<S>,
        registry: SerializerRegistry<S>,
        directory: Option<PathBuf>,
    ) -> Self {
        let journal = directory
            .as_ref()
            .map(|dir| JournalWriter::new(dir.clone(), recovered.sequence + 1));
        Self {
            system: RwLock::new(recovered.system),
            writer: Mutex::new(WriterState {
                sequence: recovered.sequence,
                journal,
                closed: false,
            }),
            registry,
            directory,
            _transaction: PhantomData,
        }
    }

    /// Executes a transaction: journal first (persistent mode), then
    /// apply. Serialized with respect to all other executes and
    /// snapshot-takes.
    pub fn execute(&self, transaction: T) -> EngineResult<()> {
        let payload = serde_json::to_vec(&transaction)
            .map_err(|e| SerializationError::encode("transaction", e))
            .map_err(EngineError::Serialization)?;

        let mut state = self.lock_writer();
        if state.closed {
            return Err(EngineError::Closed);
        }

        // Durability barrier: the record is on stable storage before the
        // in-memory mutation is considered committed.
        let sequence = match state.journal.as_mut() {
            Some(journal) => journal.append(&payload)?,
            None => state.sequence + 1,
        };

        {
            let mut system = self.write_system();
            transaction.apply(&mut system);
        }
        state.sequence = sequence;
        Ok(())
    }

    /// Runs a read-only query against a consistent view of the system.
    /// Queries may run concurrently with each other, never with a
    /// transaction's mutation.
    pub fn query<R>(&self, query: impl FnOnce(&S) -> R) -> R {
        let system = self.read_system();
        query(&system)
    }

    /// Rolls the journal and writes a snapshot of the current state with
    /// the primary strategy, so later transactions land in a journal file
    /// newer than the snapshot.
    ///
    /// Returns the sequence number the snapshot was written at.
    pub fn take_snapshot(&self) -> EngineResult<u64> {
        let mut state = self.lock_writer();
        if state.closed {
            return Err(EngineError::Closed);
        }
        let directory = self.directory.as_deref().ok_or_else(|| {
            EngineError::Config("a transient engine cannot take snapshots".to_string())
        })?;

        // Roll before publishing: once a snapshot exists at the watermark,
        // every journal file still open for appends must carry a higher
        // sequence number than it, or recovery skips those records.
        if let Some(journal) = state.journal.as_mut() {
            journal.roll()?;
        }

        let sequence = {
            let system = self.read_system();
            SnapshotManager::take_snapshot(directory, state.sequence, &*system, &self.registry)?
        };
        Ok(sequence)
    }

    /// Flushes and releases the journal file handle. Idempotent; later
    /// transactions and snapshots are refused, queries keep working.
    pub fn close(&self) -> EngineResult<()> {
        let mut state = self.lock_writer();
        if let Some(mut journal) = state.journal.take() {
            journal.close()?;
        }
        state.closed = true;
        Ok(())
    }

    /// Sequence number of the last committed event, 0 if none.
    pub fn sequence(&self) -> u64 {
        self.lock_writer().sequence
    }

    /// The storage directory, if this engine is persistent.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        // A panic while the writer lock was held means journal and memory
        // may disagree; refusing to continue is the only safe option.
        self.writer.lock().expect("prevalence writer lock poisoned")
    }

    fn read_system(&self) -> RwLockReadGuard<'_, S> {
        self.system.read().expect("prevalent system lock poisoned")
    }

    fn write_system(&self) -> std::sync::RwLockWriteGuard<'_, S> {
        self.system.write().expect("prevalent system lock poisoned")
    }
}

// Manual impl: the registry holds `dyn Serializer` strategies, so Debug
// cannot be derived. Locks are deliberately not touched here.
impl<S, T> fmt::Debug for PrevalenceEngine<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrevalenceEngine")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl<S, T> Drop for PrevalenceEngine<S, T> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.writer.lock() {
            if let Some(mut journal) = state.journal.take() {
                let _ = journal.close();
            }
            state.closed = true;
        }
    }
}
