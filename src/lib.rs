//! Sigsearch: signature lookup and Hamming-similar sample search
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SignatureService                        │
//! │        fetch_signature · find_similar_signatures            │
//! └─────────────────────────────────────────────────────────────┘
//!            │                     │                    │
//!            ▼                     ▼                    ▼
//! ┌────────────────────┐ ┌──────────────────┐ ┌───────────────────┐
//! │   MetadataCache    │ │  Block resolver  │ │ SimilarityEngine  │
//! │ (per-key loading)  │ │ (nearest sample) │ │ (partition query) │
//! └────────────────────┘ └──────────────────┘ └───────────────────┘
//!            │                     │                    │
//!            ▼                     ▼                    ▼
//! ┌─────────────────────────────────────────┐ ┌───────────────────┐
//! │   BlockStore (memory · fs · http/GCS)   │ │ memory · sqlite3  │
//! └─────────────────────────────────────────┘ └───────────────────┘
//! ```
//!
//! The algorithms (record format, nearest-sample scan, partition hashing) live
//! in `sigsearch-core`; this crate wires them to storage and query backends.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod query;
pub mod resolve;
pub mod retry;
pub mod service;
pub mod store;

pub use cache::MetadataCache;
pub use config::{LookupConfig, LookupOptions};
pub use error::LookupError;
pub use query::{SimilarMatch, SimilarityEngine};
pub use resolve::ResolvedSample;
pub use service::{SignatureService, SimilarResult};
pub use store::BlockStore;

pub use sigsearch_core::{DatasetMetadata, Point};
