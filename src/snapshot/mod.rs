//! Snapshot subsystem
//!
//! A snapshot is a full serialized copy of the prevalent system at a
//! sequence number. Snapshots make recovery fast and let journals be
//! discarded once superseded; they are never required for correctness of
//! the journal itself.
//!
//! Reading tolerates multiple historical formats: any registered suffix
//! can be deserialized. Writing does not: every new snapshot is produced
//! by the primary (first-registered) strategy, so the directory always has
//! exactly one canonical latest format at write time.
//!
//! The selection rule is deliberate about failing closed. The newest
//! snapshot by sequence number wins, whether or not its format is
//! readable; if it is not readable, startup aborts instead of silently
//! loading an older snapshot that would resurrect stale state.

mod errors;

pub use errors::{Severity, SnapshotError, SnapshotErrorCode, SnapshotResult};

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::naming::{self, FileRole};
use crate::serializer::SerializerRegistry;

/// Discovers, loads, and writes snapshot files.
pub struct SnapshotManager;

impl SnapshotManager {
    /// Finds and deserializes the newest snapshot in `directory`.
    ///
    /// Scans every file, decodes storage names, and selects the maximum
    /// sequence number among snapshot-role files of *any* suffix, known or
    /// unknown. If several snapshots share the maximum sequence (written
    /// by different strategies), the registered one is preferred in
    /// registration order.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((sequence, system)))` if a readable newest snapshot exists
    /// - `Ok(None)` if the directory holds no snapshot files (recovery
    ///   then starts from sequence 0)
    ///
    /// # Errors
    ///
    /// - `PREV_SNAPSHOT_UNREADABLE` (FATAL) if the newest snapshot's
    ///   suffix is not registered
    /// - `PREV_SNAPSHOT_IO` / `PREV_SNAPSHOT_SERIALIZATION` on read or
    ///   decode failure
    pub fn find_latest_snapshot<S>(
        directory: &Path,
        registry: &SerializerRegistry<S>,
    ) -> SnapshotResult<Option<(u64, S)>> {
        let snapshots = Self::scan_snapshots(directory)?;
        let Some(max_sequence) = snapshots.iter().map(|(sequence, _)| *sequence).max() else {
            return Ok(None);
        };

        let newest: Vec<&(u64, String)> = snapshots
            .iter()
            .filter(|(sequence, _)| *sequence == max_sequence)
            .collect();

        // Prefer a registered suffix in registration order when several
        // strategies wrote a snapshot at the same sequence.
        let chosen_suffix = registry
            .suffixes()
            .into_iter()
            .find(|suffix| newest.iter().any(|(_, s)| s == suffix));

        let Some(suffix) = chosen_suffix else {
            let offending_suffix = &newest[0].1;
            let offending = directory.join(naming::encode(
                max_sequence,
                &FileRole::Snapshot(offending_suffix.clone()),
            ));
            return Err(SnapshotError::unreadable(&offending, &registry.suffixes()));
        };

        let path = directory.join(naming::encode(
            max_sequence,
            &FileRole::Snapshot(suffix.to_string()),
        ));
        let bytes = fs::read(&path)
            .map_err(|e| SnapshotError::io_at_path(&path, "failed to read snapshot", e))?;

        let strategy = match registry.get(suffix) {
            Some(strategy) => strategy,
            None => unreachable!("chosen suffix comes from the registry"),
        };
        let system = strategy.deserialize(&bytes).map_err(|e| {
            SnapshotError::serialization(
                format!("failed to deserialize snapshot {}", path.display()),
                e,
            )
        })?;

        Ok(Some((max_sequence, system)))
    }

    /// Serializes `system` with the primary strategy and writes it at
    /// `sequence`.
    ///
    /// The snapshot is written to a temporary file, fsynced, renamed into
    /// place, and the directory is fsynced: a crash never leaves a
    /// half-written file under a snapshot name, and temporary names never
    /// decode as storage entries.
    ///
    /// Returns the sequence number written.
    pub fn take_snapshot<S>(
        directory: &Path,
        sequence: u64,
        system: &S,
        registry: &SerializerRegistry<S>,
    ) -> SnapshotResult<u64> {
        let (suffix, strategy) = registry
            .primary()
            .ok_or_else(SnapshotError::no_primary_strategy)?;

        let bytes = strategy.serialize(system).map_err(|e| {
            SnapshotError::serialization(
                format!("failed to serialize snapshot at sequence {}", sequence),
                e,
            )
        })?;

        let final_name = naming::encode(sequence, &FileRole::Snapshot(suffix.to_string()));
        let final_path = directory.join(&final_name);
        let temp_path = directory.join(format!("{}.tmp", final_name));

        Self::write_durably(&temp_path, &bytes)?;
        fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            SnapshotError::io_at_path(&final_path, "failed to publish snapshot", e)
        })?;
        Self::sync_directory(directory)?;

        Ok(sequence)
    }

    /// Returns the path a snapshot of the given sequence and suffix lives
    /// at inside `directory`.
    pub fn snapshot_path(directory: &Path, sequence: u64, suffix: &str) -> PathBuf {
        directory.join(naming::encode(sequence, &FileRole::Snapshot(suffix.to_string())))
    }

    /// Lists all `(sequence, suffix)` snapshot entries in the directory.
    fn scan_snapshots(directory: &Path) -> SnapshotResult<Vec<(u64, String)>> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SnapshotError::io_at_path(
                    directory,
                    "failed to scan storage directory",
                    e,
                ))
            }
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SnapshotError::io_at_path(directory, "failed to scan storage directory", e)
            })?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some((sequence, FileRole::Snapshot(suffix))) = naming::decode(name) {
                snapshots.push((sequence, suffix));
            }
        }
        Ok(snapshots)
    }

    fn write_durably(path: &Path, bytes: &[u8]) -> SnapshotResult<()> {
        let mut file = File::create(path)
            .map_err(|e| SnapshotError::io_at_path(path, "failed to create snapshot file", e))?;
        file.write_all(bytes)
            .map_err(|e| SnapshotError::io_at_path(path, "failed to write snapshot", e))?;
        file.sync_all()
            .map_err(|e| SnapshotError::io_at_path(path, "failed to fsync snapshot", e))
    }

    fn sync_directory(directory: &Path) -> SnapshotResult<()> {
        let handle = OpenOptions::new().read(true).open(directory).map_err(|e| {
            SnapshotError::io_at_path(directory, "failed to open directory for fsync", e)
        })?;
        handle
            .sync_all()
            .map_err(|e| SnapshotError::io_at_path(directory, "failed to fsync directory", e))
    }
}
