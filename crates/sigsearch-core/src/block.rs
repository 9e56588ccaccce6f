//! Zero-copy view over a block buffer and nearest-sample search.
//!
//! A `Block` borrows the raw bytes fetched from the object store and decodes
//! records on demand. Nothing is cached between lookups; every query re-reads
//! the block it needs.

use crate::format::{SampleRecord, RECORD_SIZE};
use crate::point::Point;

/// Read-only view of a block's packed records
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    data: &'a [u8],
    count: usize,
}

/// Winner of a nearest-sample scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    pub record: SampleRecord,
    /// Euclidean distance from the query point
    pub distance: f64,
    /// Position of the record within the block
    pub index: usize,
}

impl<'a> Block<'a> {
    /// Wrap a raw block buffer. Trailing bytes that do not form a full record
    /// are ignored; see [`Block::trailing_bytes`].
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            count: data.len() / RECORD_SIZE,
        }
    }

    /// Number of complete records
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes past the last complete record. Non-zero means the block was
    /// truncated or padded at build time.
    #[inline]
    pub fn trailing_bytes(&self) -> usize {
        self.data.len() % RECORD_SIZE
    }

    /// Decode the record at `index`, or `None` when out of bounds.
    #[inline]
    pub fn get(&self, index: usize) -> Option<SampleRecord> {
        if index >= self.count {
            return None;
        }
        let start = index * RECORD_SIZE;
        let bytes: &[u8; RECORD_SIZE] = self.data[start..start + RECORD_SIZE].try_into().ok()?;
        Some(SampleRecord::from_bytes(bytes))
    }

    /// Iterate records in stored order
    pub fn iter(&self) -> BlockIter<'a> {
        BlockIter {
            chunks: self.data.chunks_exact(RECORD_SIZE),
        }
    }

    /// Closest record within `max_distance` of `query`.
    ///
    /// The bound is inclusive. Among records at the same minimal distance the
    /// one stored first wins: a later record only replaces the running best
    /// when it is strictly closer. A NaN `max_distance` admits nothing.
    pub fn nearest(&self, query: &Point, max_distance: f64) -> Option<Nearest> {
        let mut best: Option<Nearest> = None;

        for (index, record) in self.iter().enumerate() {
            let distance = query.distance(&record.point);
            let within = distance <= max_distance;
            if !within {
                continue;
            }
            let closer = best.map_or(true, |b| distance < b.distance);
            if closer {
                best = Some(Nearest {
                    record,
                    distance,
                    index,
                });
            }
        }

        best
    }
}

impl<'a> IntoIterator for &Block<'a> {
    type Item = SampleRecord;
    type IntoIter = BlockIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the records of a block
pub struct BlockIter<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = SampleRecord;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        let bytes: &[u8; RECORD_SIZE] = chunk.try_into().ok()?;
        Some(SampleRecord::from_bytes(bytes))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<'a> ExactSizeIterator for BlockIter<'a> {}
