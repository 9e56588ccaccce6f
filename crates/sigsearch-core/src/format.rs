//! Block record format
//!
//! A block file is a flat run of fixed-size records. There is no header and
//! no footer; the record count is `byte_length / RECORD_SIZE` and any
//! remainder is ignored by readers.
//!
//! # Record Structure
//!
//! ```text
//! Offset   Size    Type        Description
//! ─────────────────────────────────────────────
//! 0x00     4       i32 LE      x
//! 0x04     4       i32 LE      y
//! 0x08     4       i32 LE      z
//! 0x0C     8       i64 LE      signature (two's complement)
//! ```
//!
//! Record order is insertion order from dataset build time and carries
//! meaning: nearest-sample ties are broken by it.
//!
//! # Example
//!
//! ```
//! use sigsearch_core::{BlockWriter, Point, SampleRecord};
//!
//! let mut writer = BlockWriter::new();
//! writer.push(SampleRecord::new(Point::new(18416, 16369, 26467), 123456789));
//! let bytes = writer.finish();
//! assert_eq!(bytes.len(), 20);
//! ```

use std::io::{self, Write};

use thiserror::Error;

use crate::point::Point;

/// Record size in bytes: 3 × 4 (coordinates) + 8 (signature) = 20
pub const RECORD_SIZE: usize = 20;

const SIGNATURE_OFFSET: usize = 12;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Record truncated: expected 20 bytes, got {actual}")]
    Truncated { actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One (point, signature) sample as stored in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleRecord {
    pub point: Point,
    /// Opaque 64-bit fingerprint. Compared bit-wise, never numerically.
    pub signature: i64,
}

impl SampleRecord {
    pub const fn new(point: Point, signature: i64) -> Self {
        Self { point, signature }
    }

    /// Decode a record from exactly `RECORD_SIZE` bytes.
    #[inline]
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let x = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let y = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let z = i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let mut sig = [0u8; 8];
        sig.copy_from_slice(&bytes[SIGNATURE_OFFSET..RECORD_SIZE]);

        Self {
            point: Point::new(x, y, z),
            signature: i64::from_le_bytes(sig),
        }
    }

    /// Decode the first record of a slice.
    pub fn read_from(bytes: &[u8]) -> Result<Self, FormatError> {
        let head: &[u8; RECORD_SIZE] = bytes
            .get(..RECORD_SIZE)
            .and_then(|s| s.try_into().ok())
            .ok_or(FormatError::Truncated {
                actual: bytes.len(),
            })?;
        Ok(Self::from_bytes(head))
    }

    /// Encode to the on-disk layout
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.point.x.to_le_bytes());
        buf[4..8].copy_from_slice(&self.point.y.to_le_bytes());
        buf[8..12].copy_from_slice(&self.point.z.to_le_bytes());
        buf[SIGNATURE_OFFSET..RECORD_SIZE].copy_from_slice(&self.signature.to_le_bytes());
        buf
    }
}

/// Encode a slice of records into a block buffer.
pub fn encode_block(records: &[SampleRecord]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(records.len() * RECORD_SIZE);
    for record in records {
        buf.extend_from_slice(&record.to_bytes());
    }
    buf
}

/// In-memory builder for block files.
///
/// Mostly used by tests and fixtures; production blocks are produced by the
/// dataset build tooling.
#[derive(Debug, Default)]
pub struct BlockWriter {
    buf: Vec<u8>,
    count: usize,
}

impl BlockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(records: usize) -> Self {
        Self {
            buf: Vec::with_capacity(records * RECORD_SIZE),
            count: 0,
        }
    }

    /// Append a record, preserving insertion order
    pub fn push(&mut self, record: SampleRecord) -> &mut Self {
        self.buf.extend_from_slice(&record.to_bytes());
        self.count += 1;
        self
    }

    /// Number of records pushed so far
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Write the encoded block to a sink, returning the byte count.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<usize, FormatError> {
        writer.write_all(&self.buf)?;
        Ok(self.buf.len())
    }

    /// Consume the writer and return the encoded block
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
