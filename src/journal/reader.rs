//! Journal reader with strict corruption detection
//!
//! Zero tolerance policy during replay:
//! - any corruption halts recovery immediately
//! - no partial replay past a corrupt record
//! - no skipping records
//! - no repair attempts
//!
//! Records inside one journal file occupy consecutive sequence numbers
//! starting at the file's own sequence number; any gap or repetition is
//! corruption.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::naming::{self, FileRole};

use super::errors::{JournalError, JournalResult};
use super::record::{JournalRecord, MIN_RECORD_SIZE};

/// Sequential reader over one journal file.
pub struct JournalReader {
    /// Path to the journal file
    path: PathBuf,
    /// Buffered reader for sequential reads
    reader: BufReader<File>,
    /// Current byte offset in the file
    offset: u64,
    /// Total file size
    file_size: u64,
    /// Sequence number the next record must carry
    next_expected: u64,
    /// Number of records successfully read
    records_read: u64,
}

impl JournalReader {
    /// Opens a journal file for replay.
    ///
    /// The file name must decode as a journal storage entry; the embedded
    /// sequence number is the sequence the first record must carry.
    pub fn open(path: &Path) -> JournalResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                JournalError::corruption(format!("not a journal file: {}", path.display()))
            })?;
        let first_sequence = match naming::decode(file_name) {
            Some((sequence, FileRole::Journal)) => sequence,
            _ => {
                return Err(JournalError::corruption(format!(
                    "not a journal file: {}",
                    path.display()
                )))
            }
        };

        let file = File::open(path).map_err(|e| {
            JournalError::io(format!("failed to open journal file: {}", path.display()), e)
        })?;
        let metadata = file.metadata().map_err(|e| {
            JournalError::io(
                format!("failed to read journal metadata: {}", path.display()),
                e,
            )
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file_size: metadata.len(),
            reader: BufReader::new(file),
            offset: 0,
            next_expected: first_sequence,
            records_read: 0,
        })
    }

    /// Returns the path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current byte offset in the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Sequence number of the last successfully read record, or `None`
    /// before any record has been read.
    pub fn last_sequence(&self) -> Option<u64> {
        if self.records_read > 0 {
            Some(self.next_expected - 1)
        } else {
            None
        }
    }

    /// Reads the next record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` on success
    /// - `Ok(None)` on a clean end of file
    /// - `Err` with `PREV_JOURNAL_CORRUPTION` on any truncation, framing
    ///   violation, checksum mismatch, or out-of-order sequence number
    pub fn read_next(&mut self) -> JournalResult<Option<JournalRecord>> {
        if self.offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.offset;
        if remaining < MIN_RECORD_SIZE as u64 {
            return Err(JournalError::corruption_at_offset(
                self.offset,
                format!(
                    "truncated journal {}: {} bytes remaining, minimum record size is {}",
                    self.path.display(),
                    remaining,
                    MIN_RECORD_SIZE
                ),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.read_exact(&mut len_buf)?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < MIN_RECORD_SIZE as u64 {
            return Err(JournalError::corruption_at_offset(
                self.offset,
                format!("invalid record length {}", record_length),
            ));
        }
        if record_length > remaining {
            return Err(JournalError::corruption_at_offset(
                self.offset,
                format!(
                    "record length {} exceeds remaining {} bytes",
                    record_length, remaining
                ),
            ));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[0..4].copy_from_slice(&len_buf);
        self.read_exact(&mut record_buf[4..])?;

        let (record, _) = JournalRecord::deserialize(&record_buf).map_err(|e| {
            JournalError::corruption_at_offset(
                self.offset,
                format!("{} in {}", e.message(), self.path.display()),
            )
        })?;

        if record.sequence != self.next_expected {
            return Err(JournalError::corruption_at_sequence(
                record.sequence,
                format!(
                    "non-sequential record in {}: expected sequence {}, got {}",
                    self.path.display(),
                    self.next_expected,
                    record.sequence
                ),
            ));
        }

        self.offset += record_length;
        self.next_expected += 1;
        self.records_read += 1;
        Ok(Some(record))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> JournalResult<()> {
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                JournalError::corruption_at_offset(
                    self.offset,
                    format!("journal {} truncated mid-record", self.path.display()),
                )
            } else {
                JournalError::io(
                    format!("failed to read journal file: {}", self.path.display()),
                    e,
                )
            }
        })
    }
}

/// Enumerates journal files with a sequence number strictly greater than
/// `after`, sorted ascending. These are exactly the journals that must be
/// replayed on top of a snapshot loaded at sequence `after`.
///
/// Two journal files claiming the same sequence number is corruption;
/// there is no tie-break.
pub fn find_journals_after(directory: &Path, after: u64) -> JournalResult<Vec<(u64, PathBuf)>> {
    let entries = std::fs::read_dir(directory).map_err(|e| {
        JournalError::io(
            format!("failed to scan storage directory: {}", directory.display()),
            e,
        )
    })?;

    let mut journals = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            JournalError::io(
                format!("failed to scan storage directory: {}", directory.display()),
                e,
            )
        })?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some((sequence, FileRole::Journal)) = naming::decode(name) {
            if sequence > after {
                journals.push((sequence, entry.path()));
            }
        }
    }

    journals.sort_by_key(|(sequence, _)| *sequence);
    for pair in journals.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(JournalError::corruption_at_sequence(
                pair[0].0,
                format!(
                    "two journal files share sequence {}: {} and {}",
                    pair[0].0,
                    pair[0].1.display(),
                    pair[1].1.display()
                ),
            ));
        }
    }
    Ok(journals)
}
