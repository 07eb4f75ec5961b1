//! Journal subsystem
//!
//! The journal is the write-ahead log of the prevalence engine: every
//! transaction is appended and fsynced here before it is applied to the
//! in-memory system. Journal files are named after the sequence number of
//! their first record; a new file is started on the first append after
//! startup and after every snapshot, so a snapshot at sequence N is
//! followed only by journal files with sequence numbers greater than N.

mod errors;
mod reader;
mod record;
mod writer;

pub use errors::{JournalError, JournalErrorCode, JournalResult, Severity};
pub use reader::{find_journals_after, JournalReader};
pub use record::{compute_checksum, JournalRecord, MIN_RECORD_SIZE, RECORD_OVERHEAD};
pub use writer::JournalWriter;
