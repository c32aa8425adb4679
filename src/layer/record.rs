//! Record log format
//!
//! The file backend appends one record per `set`.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```
//! All integers are big-endian. The CRC32 covers `Data`, the bincode
//! encoding of the record.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{KvsalError, Result};

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest accepted data section; anything bigger is treated as corruption
const MAX_DATA_SIZE: usize = 64 * 1024;

/// A single `set` as stored in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    pub key: String,

    pub value: String,

    /// Timestamp (unix millis) when the record was created
    pub timestamp: u64,
}

/// Outcome of decoding one frame
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, verified record and the number of bytes it used
    Record(Record, usize),

    /// The bytes end in the middle of a frame (torn write)
    Partial,
}

impl Record {
    pub fn new(lsn: u64, key: impl Into<String>, value: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            key: key.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// Encode the record as a complete frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let crc = crc32fast::hash(&data);

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_be_bytes());
        frame.extend_from_slice(&crc.to_be_bytes());
        frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
        frame.extend_from_slice(&data);

        Ok(frame)
    }

    /// Decode the frame at the start of `bytes`
    ///
    /// A frame cut short by the end of `bytes` is `Decoded::Partial`. A
    /// complete frame whose checksum, length or LSN does not hold up is a
    /// `Corruption` error.
    pub fn decode(bytes: &[u8]) -> Result<Decoded> {
        if bytes.len() < HEADER_SIZE {
            return Ok(Decoded::Partial);
        }

        let lsn = u64::from_be_bytes(slice_array(&bytes[0..8]));
        let crc = u32::from_be_bytes(slice_array(&bytes[8..12]));
        let len = u32::from_be_bytes(slice_array(&bytes[12..16])) as usize;

        if len > MAX_DATA_SIZE {
            return Err(KvsalError::Corruption(format!(
                "record {} claims {} data bytes (max {})",
                lsn, len, MAX_DATA_SIZE
            )));
        }

        let total = HEADER_SIZE + len;
        if bytes.len() < total {
            return Ok(Decoded::Partial);
        }

        let data = &bytes[HEADER_SIZE..total];
        let actual = crc32fast::hash(data);
        if actual != crc {
            return Err(KvsalError::Corruption(format!(
                "record {} checksum mismatch: stored {:#010x}, computed {:#010x}",
                lsn, crc, actual
            )));
        }

        let record: Record = bincode::deserialize(data)
            .map_err(|e| KvsalError::Corruption(format!("record {}: {}", lsn, e)))?;
        if record.lsn != lsn {
            return Err(KvsalError::Corruption(format!(
                "record header LSN {} does not match body LSN {}",
                lsn, record.lsn
            )));
        }

        Ok(Decoded::Record(record, total))
    }
}

fn slice_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
