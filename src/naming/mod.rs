//! Storage file naming scheme
//!
//! Every journal and snapshot file is named after the sequence number of
//! the first event it covers, rendered as a fixed-width zero-padded decimal
//! so that lexical sort order equals numeric order:
//!
//! ```text
//! 000000000000000000001.journal
//! 000000000000000000002.snapshot
//! ```
//!
//! The suffix identifies the role: `journal` for the transaction log, or
//! the suffix of the serializer that wrote a snapshot. Decoding a name with
//! an unregistered snapshot suffix still yields a valid sequence number;
//! whether the file is readable is decided by the snapshot manager, which
//! must refuse to start when the newest snapshot is unreadable.

/// Reserved suffix of journal files. No serializer may register it.
pub const JOURNAL_SUFFIX: &str = "journal";

/// Width of the zero-padded sequence field. u64 needs at most 20 digits,
/// so every sequence number is representable.
pub const SEQUENCE_DIGITS: usize = 21;

/// Role of a storage file, derived from its suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRole {
    /// Append-only transaction log.
    Journal,
    /// Full-system snapshot written by the serializer registered under
    /// the contained suffix.
    Snapshot(String),
}

impl FileRole {
    /// Returns the file suffix for this role.
    pub fn suffix(&self) -> &str {
        match self {
            FileRole::Journal => JOURNAL_SUFFIX,
            FileRole::Snapshot(suffix) => suffix,
        }
    }

    /// Returns true if this role is a snapshot of any format.
    pub fn is_snapshot(&self) -> bool {
        matches!(self, FileRole::Snapshot(_))
    }
}

/// Encodes a sequence number and role into a canonical file name.
pub fn encode(sequence: u64, role: &FileRole) -> String {
    format!("{:0width$}.{}", sequence, role.suffix(), width = SEQUENCE_DIGITS)
}

/// Decodes a file name into a sequence number and role.
///
/// Returns `None` for anything that is not a storage file:
/// - sequence field not exactly 21 ASCII digits
/// - sequence value outside the u64 range
/// - empty suffix, suffix containing further dots, or non-alphanumeric
///   suffix (this keeps temp files like `<name>.tmp` invisible to scans)
///
/// A name with an unknown but well-formed suffix decodes successfully as
/// `FileRole::Snapshot`; the caller decides whether it can be read.
pub fn decode(file_name: &str) -> Option<(u64, FileRole)> {
    let (digits, suffix) = file_name.split_once('.')?;
    if digits.len() != SEQUENCE_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let sequence: u64 = digits.parse().ok()?;
    let role = if suffix == JOURNAL_SUFFIX {
        FileRole::Journal
    } else {
        FileRole::Snapshot(suffix.to_string())
    };
    Some((sequence, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_zero_padded() {
        assert_eq!(encode(1, &FileRole::Journal), "000000000000000000001.journal");
        assert_eq!(
            encode(2, &FileRole::Snapshot("snapshot".to_string())),
            "000000000000000000002.snapshot"
        );
    }

    #[test]
    fn test_lexical_order_equals_numeric_order() {
        let a = encode(9, &FileRole::Journal);
        let b = encode(10, &FileRole::Journal);
        let c = encode(100, &FileRole::Journal);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_decode_roundtrip() {
        let name = encode(42, &FileRole::Snapshot("xmlsnapshot".to_string()));
        let (sequence, role) = decode(&name).unwrap();
        assert_eq!(sequence, 42);
        assert_eq!(role, FileRole::Snapshot("xmlsnapshot".to_string()));
    }

    #[test]
    fn test_decode_journal_role() {
        let (sequence, role) = decode("000000000000000000007.journal").unwrap();
        assert_eq!(sequence, 7);
        assert_eq!(role, FileRole::Journal);
    }

    #[test]
    fn test_decode_unknown_suffix_still_yields_sequence() {
        // Needed by the rejection rule: an unreadable snapshot must still
        // be discoverable so startup can refuse instead of falling back.
        let (sequence, role) = decode("000000000000000000003.weirdformat").unwrap();
        assert_eq!(sequence, 3);
        assert!(role.is_snapshot());
    }

    #[test]
    fn test_decode_rejects_non_storage_names() {
        assert!(decode("foo.txt").is_none());
        assert!(decode("readme").is_none());
        assert!(decode("00000001.journal").is_none()); // too few digits
        assert!(decode("0000000000000000000001.journal").is_none()); // too many
        assert!(decode("000000000000000000001.").is_none()); // empty suffix
        assert!(decode("000000000000000000001").is_none()); // no suffix
    }

    #[test]
    fn test_decode_rejects_temp_files() {
        assert!(decode("000000000000000000002.snapshot.tmp").is_none());
    }

    #[test]
    fn test_decode_rejects_out_of_range_sequence() {
        // 21 nines exceeds u64::MAX; such a name is not a storage file.
        assert!(decode("999999999999999999999.journal").is_none());
    }

    #[test]
    fn test_max_u64_is_representable() {
        let name = encode(u64::MAX, &FileRole::Journal);
        let (sequence, _) = decode(&name).unwrap();
        assert_eq!(sequence, u64::MAX);
    }
}
