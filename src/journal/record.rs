//! Journal record framing
//!
//! Each journal record is self-delimiting and checksummed:
//!
//! ```text
//! record length   u32 LE   total bytes including length and checksum
//! sequence        u64 LE   global sequence number of the transaction
//! payload length  u32 LE
//! payload         bytes    serialized transaction
//! checksum        u32 LE   CRC32 over everything before the checksum
//! ```
//!
//! Any checksum mismatch, truncation, or inconsistent length is
//! corruption. Replay never skips or repairs a record.

use crc32fast::Hasher;

use super::errors::{JournalError, JournalResult};

/// Fixed framing overhead: length + sequence + payload length + checksum.
pub const RECORD_OVERHEAD: usize = 4 + 8 + 4 + 4;

/// Smallest possible record (empty payload).
pub const MIN_RECORD_SIZE: usize = RECORD_OVERHEAD;

/// One journaled transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Global sequence number of this transaction.
    pub sequence: u64,
    /// Serialized transaction bytes.
    pub payload: Vec<u8>,
}

impl JournalRecord {
    /// Creates a record for the given sequence and payload.
    pub fn new(sequence: u64, payload: Vec<u8>) -> Self {
        Self { sequence, payload }
    }

    /// Total on-disk size of this record in bytes.
    pub fn encoded_len(&self) -> usize {
        RECORD_OVERHEAD + self.payload.len()
    }

    /// Serializes the record into its on-disk framing.
    pub fn serialize(&self) -> Vec<u8> {
        let total = self.encoded_len();
        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        let checksum = compute_checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Deserializes one record from the start of `data`.
    ///
    /// `data` must contain the complete record. Returns the record and the
    /// number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> JournalResult<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(JournalError::corruption(format!(
                "truncated record: {} bytes available, minimum record size is {}",
                data.len(),
                MIN_RECORD_SIZE
            )));
        }

        let total = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if total < MIN_RECORD_SIZE {
            return Err(JournalError::corruption(format!(
                "invalid record length {}",
                total
            )));
        }
        if total > data.len() {
            return Err(JournalError::corruption(format!(
                "record length {} exceeds available {} bytes",
                total,
                data.len()
            )));
        }

        let sequence = u64::from_le_bytes([
            data[4], data[5], data[6], data[7], data[8], data[9], data[10], data[11],
        ]);
        let payload_len = u32::from_le_bytes([data[12], data[13], data[14], data[15]]) as usize;
        if total != RECORD_OVERHEAD + payload_len {
            return Err(JournalError::corruption_at_sequence(
                sequence,
                format!(
                    "inconsistent framing: record length {} does not match payload length {}",
                    total, payload_len
                ),
            ));
        }

        let checksum_offset = total - 4;
        let stored = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        let computed = compute_checksum(&data[..checksum_offset]);
        if stored != computed {
            return Err(JournalError::corruption_at_sequence(
                sequence,
                format!(
                    "checksum mismatch: stored {:#010x}, computed {:#010x}",
                    stored, computed
                ),
            ));
        }

        let payload = data[16..16 + payload_len].to_vec();
        Ok((Self { sequence, payload }, total))
    }
}

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let record = JournalRecord::new(7, b"{\"append\":\" one\"}".to_vec());
        let bytes = record.serialize();
        let (decoded, consumed) = JournalRecord::deserialize(&bytes).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let record = JournalRecord::new(1, Vec::new());
        let bytes = record.serialize();
        assert_eq!(bytes.len(), MIN_RECORD_SIZE);
        let (decoded, _) = JournalRecord::deserialize(&bytes).unwrap();
        assert_eq!(decoded.sequence, 1);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_bit_flip_detected() {
        let record = JournalRecord::new(3, b"payload bytes".to_vec());
        let mut bytes = record.serialize();
        bytes[17] ^= 0x01; // flip one payload bit
        let err = JournalRecord::deserialize(&bytes).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.message().contains("checksum mismatch"));
    }

    #[test]
    fn test_truncation_detected() {
        let record = JournalRecord::new(3, b"payload bytes".to_vec());
        let bytes = record.serialize();
        let err = JournalRecord::deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_too_short_detected() {
        let err = JournalRecord::deserialize(&[0u8; 4]).unwrap_err();
        assert!(err.message().contains("truncated"));
    }

    #[test]
    fn test_inconsistent_lengths_detected() {
        let record = JournalRecord::new(3, b"abcdef".to_vec());
        let mut bytes = record.serialize();
        // Claim a shorter payload than the record length implies.
        bytes[12..16].copy_from_slice(&2u32.to_le_bytes());
        let err = JournalRecord::deserialize(&bytes).unwrap_err();
        assert!(err.message().contains("inconsistent framing"));
    }

    #[test]
    fn test_consecutive_records_consume_exactly() {
        let a = JournalRecord::new(1, b"first".to_vec());
        let b = JournalRecord::new(2, b"second".to_vec());
        let mut bytes = a.serialize();
        bytes.extend_from_slice(&b.serialize());

        let (first, used) = JournalRecord::deserialize(&bytes).unwrap();
        assert_eq!(first.sequence, 1);
        let (second, _) = JournalRecord::deserialize(&bytes[used..]).unwrap();
        assert_eq!(second.sequence, 2);
    }
}
