//! Per-dataset metadata (`{dataset}/info.json`)
//!
//! # Layout
//!
//! ```text
//! {
//!   "block_size": 1000,
//!   "ham_0": "9223512776490647552",   // mask, decimal string as written by the build tool
//!   "ham_1": 18446744069414584320,    // ...or a JSON number, signed or unsigned
//!   "ham_2": -4294967296,
//!   "ham_3": "0xFF000000",
//!   "num_bits": 64                    // optional
//! }
//! ```
//!
//! Masks are 64-bit patterns. However they are spelled, they are reinterpreted
//! as raw two's-complement bits; `-1` and `18446744073709551615` are the same
//! mask.

use serde::Deserialize;
use thiserror::Error;

use crate::point::{BlockCoord, Point};

/// Number of hash masks / partition tables per dataset
pub const NUM_MASKS: usize = 4;

/// Signature width the partitioning scheme is defined for
pub const SIGNATURE_BITS: u32 = 64;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid metadata: {0}")]
    Invalid(String),
}

/// Parsed, validated dataset metadata. Immutable after load.
///
/// Only [`DatasetMetadata::new`] and [`DatasetMetadata::from_json_slice`]
/// build one, so `block_size` is always positive:
///
/// ```compile_fail
/// use sigsearch_core::DatasetMetadata;
///
/// let meta = DatasetMetadata { block_size: 0, ham_masks: [0; 4] };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetMetadata {
    block_size: u32,
    ham_masks: [u64; NUM_MASKS],
}

#[derive(Deserialize)]
struct RawMetadata {
    block_size: i64,
    ham_0: MaskValue,
    ham_1: MaskValue,
    ham_2: MaskValue,
    ham_3: MaskValue,
    #[serde(default)]
    num_bits: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaskValue {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl MaskValue {
    fn to_bits(&self, field: &str) -> Result<u64, MetadataError> {
        match self {
            MaskValue::Unsigned(v) => Ok(*v),
            MaskValue::Signed(v) => Ok(*v as u64),
            MaskValue::Text(s) => parse_mask_text(s).ok_or_else(|| {
                MetadataError::Invalid(format!("{field}: '{s}' is not a 64-bit integer"))
            }),
        }
    }
}

fn parse_mask_text(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<i64>().ok().map(|v| v as u64))
}

impl DatasetMetadata {
    pub fn new(block_size: u32, ham_masks: [u64; NUM_MASKS]) -> Result<Self, MetadataError> {
        if block_size == 0 {
            return Err(MetadataError::Invalid("block_size must be positive".into()));
        }
        Ok(Self {
            block_size,
            ham_masks,
        })
    }

    /// Side length of a cubical block, always > 0
    #[inline]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Bit-subset masks used to derive partition ids
    #[inline]
    pub fn ham_masks(&self) -> &[u64; NUM_MASKS] {
        &self.ham_masks
    }

    /// Block grid coordinate containing `point`
    #[inline]
    pub fn block_coord(&self, point: &Point) -> BlockCoord {
        point.block_coord(self.block_size)
    }

    /// Parse and validate an `info.json` payload
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, MetadataError> {
        let raw: RawMetadata = serde_json::from_slice(bytes)?;

        if raw.block_size <= 0 {
            return Err(MetadataError::Invalid(format!(
                "block_size must be positive, got {}",
                raw.block_size
            )));
        }
        let block_size = u32::try_from(raw.block_size).map_err(|_| {
            MetadataError::Invalid(format!("block_size {} out of range", raw.block_size))
        })?;

        if let Some(bits) = raw.num_bits {
            if bits != SIGNATURE_BITS {
                return Err(MetadataError::Invalid(format!(
                    "num_bits must be {SIGNATURE_BITS}, got {bits}"
                )));
            }
        }

        let ham_masks = [
            raw.ham_0.to_bits("ham_0")?,
            raw.ham_1.to_bits("ham_1")?,
            raw.ham_2.to_bits("ham_2")?,
            raw.ham_3.to_bits("ham_3")?,
        ];

        Self::new(block_size, ham_masks)
    }

    /// Serialize in the build tool's spelling (masks as decimal strings)
    pub fn to_json_vec(&self) -> Vec<u8> {
        let value = serde_json::json!({
            "block_size": self.block_size,
            "ham_0": self.ham_masks[0].to_string(),
            "ham_1": self.ham_masks[1].to_string(),
            "ham_2": self.ham_masks[2].to_string(),
            "ham_3": self.ham_masks[3].to_string(),
            "num_bits": SIGNATURE_BITS,
        });
        value.to_string().into_bytes()
    }
}
