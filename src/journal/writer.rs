//! Journal writer with fsync enforcement
//!
//! Write-ahead ordering: a transaction is durable only after its record
//! has been appended and fsynced; the caller applies the transaction to
//! the in-memory system only after `append` returns Ok. Acknowledgment
//! before fsync is forbidden.
//!
//! The writer is lazy: the journal file for the next sequence number is
//! created on the first append after startup or after a snapshot, so an
//! engine that never executes a transaction leaves no journal behind.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::naming::{self, FileRole};

use super::errors::{JournalError, JournalResult};
use super::record::JournalRecord;

struct OpenJournal {
    file: File,
    path: PathBuf,
}

/// Appends serialized transactions to the current journal file.
pub struct JournalWriter {
    /// Storage directory holding all journal and snapshot files
    directory: PathBuf,
    /// Next sequence number to assign (continues across roll-overs)
    next_sequence: u64,
    /// Currently open journal file, if any
    current: Option<OpenJournal>,
}

impl JournalWriter {
    /// Creates an idle writer over `directory`.
    ///
    /// `next_sequence` is one past the highest sequence number recovery
    /// observed in the directory; the first appended transaction gets it,
    /// and the journal file it opens is named after it.
    pub fn new(directory: impl Into<PathBuf>, next_sequence: u64) -> Self {
        Self {
            directory: directory.into(),
            next_sequence,
            current: None,
        }
    }

    /// Returns the next sequence number that will be assigned.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Returns the path of the currently open journal file, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|j| j.path.as_path())
    }

    /// Appends one serialized transaction and fsyncs.
    ///
    /// Returns the sequence number assigned to the transaction. The
    /// sequence is only advanced after a successful fsync.
    ///
    /// # Errors
    ///
    /// - `PREV_JOURNAL_APPEND_FAILED` if the file cannot be created or
    ///   written
    /// - `PREV_JOURNAL_FSYNC_FAILED` if fsync fails (FATAL)
    pub fn append(&mut self, payload: &[u8]) -> JournalResult<u64> {
        if self.current.is_none() {
            self.current = Some(self.open_next_file()?);
        }
        let journal = match self.current.as_mut() {
            Some(journal) => journal,
            None => unreachable!("journal file opened above"),
        };

        let sequence = self.next_sequence;
        let record = JournalRecord::new(sequence, payload.to_vec());
        let serialized = record.serialize();

        journal.file.write_all(&serialized).map_err(|e| {
            JournalError::append_failed(
                format!(
                    "failed to write journal record at sequence {} to {}",
                    sequence,
                    journal.path.display()
                ),
                e,
            )
        })?;

        journal.file.sync_all().map_err(|e| {
            JournalError::fsync_failed(
                format!("fsync failed after journal append at sequence {}", sequence),
                e,
            )
        })?;

        self.next_sequence += 1;
        Ok(sequence)
    }

    /// Closes the current journal file so the next append opens a fresh
    /// one. Called after a snapshot: journal files written after a
    /// snapshot must carry a higher sequence number than the snapshot.
    pub fn roll(&mut self) -> JournalResult<()> {
        self.close()
    }

    /// Flushes and releases the current journal file handle. Idempotent.
    pub fn close(&mut self) -> JournalResult<()> {
        if let Some(journal) = self.current.take() {
            journal.file.sync_all().map_err(|e| {
                JournalError::fsync_failed(
                    format!("fsync failed while closing {}", journal.path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Opens a new journal file named after the next sequence number.
    ///
    /// `create_new` refuses to reuse a sequence slot: two journals must
    /// never share a sequence number.
    fn open_next_file(&self) -> JournalResult<OpenJournal> {
        let name = naming::encode(self.next_sequence, &FileRole::Journal);
        let path = self.directory.join(name);
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    JournalError::append_failed(
                        format!("journal file already exists: {}", path.display()),
                        e,
                    )
                } else {
                    JournalError::append_failed(
                        format!("failed to create journal file: {}", path.display()),
                        e,
                    )
                }
            })?;
        Ok(OpenJournal { file, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_file_until_first_append() {
        let temp_dir = TempDir::new().unwrap();
        let writer = JournalWriter::new(temp_dir.path(), 1);

        assert!(writer.current_path().is_none());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_first_append_opens_file_named_after_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(temp_dir.path(), 1);

        let seq = writer.append(b"first").unwrap();
        assert_eq!(seq, 1);
        assert!(temp_dir.path().join("000000000000000000001.journal").exists());
    }

    #[test]
    fn test_sequences_increment_within_one_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(temp_dir.path(), 1);

        assert_eq!(writer.append(b"one").unwrap(), 1);
        assert_eq!(writer.append(b"two").unwrap(), 2);
        assert_eq!(writer.append(b"three").unwrap(), 3);
        assert_eq!(writer.next_sequence(), 4);

        // All three records share one journal file.
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_roll_starts_new_file_at_next_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(temp_dir.path(), 1);

        writer.append(b"one").unwrap();
        writer.append(b"two").unwrap();
        writer.roll().unwrap();
        writer.append(b"three").unwrap();

        assert!(temp_dir.path().join("000000000000000000001.journal").exists());
        assert!(temp_dir.path().join("000000000000000000003.journal").exists());
    }

    #[test]
    fn test_sequence_slot_never_reused() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(temp_dir.path(), 5);
        writer.append(b"five").unwrap();

        // A second writer claiming the same slot must fail on append.
        let mut stale = JournalWriter::new(temp_dir.path(), 5);
        let err = stale.append(b"clash").unwrap_err();
        assert!(err.message().contains("already exists"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(temp_dir.path(), 1);
        writer.append(b"one").unwrap();

        writer.close().unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_starting_sequence_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(temp_dir.path(), 42);

        assert_eq!(writer.append(b"resumed").unwrap(), 42);
        assert!(temp_dir.path().join("000000000000000000042.journal").exists());
    }
}
