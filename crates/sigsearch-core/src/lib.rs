//! Sigsearch Core – block record format, nearest-sample search and signature partitioning
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Partition hashing (masks · murmur64 finalizer)       │
//! │            signature → [p0, p1, p2, p3] (mod 4000)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │       Nearest-sample search over a block (radius bound)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Block record format (x,y,z: i32 · signature: i64, LE)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything in this crate is pure: no I/O beyond `std::io::Write` sinks for
//! the block writer. Fetching blocks and metadata is the job of the service
//! crate's object-store adapters.

pub mod block;
pub mod format;
pub mod hash;
pub mod metadata;
pub mod point;

pub use block::{Block, Nearest};
pub use format::{encode_block, BlockWriter, SampleRecord, RECORD_SIZE};
pub use hash::{finalize, hamming_distance, partition, partitions, PARTITIONS};
pub use metadata::{DatasetMetadata, MetadataError, NUM_MASKS};
pub use point::{BlockCoord, Point};
