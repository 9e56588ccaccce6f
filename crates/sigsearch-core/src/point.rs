//! Integer points in a dataset's coordinate space and their owning blocks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A sample location. Serialized as `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in real units.
    ///
    /// Inputs are integers but the comparison threshold (`max_distance`) is a
    /// real number, so this stays in `f64` rather than comparing squared
    /// integer distances.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Block grid coordinate containing this point (component-wise floor division).
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero. Prefer [`DatasetMetadata::block_coord`](crate::DatasetMetadata::block_coord),
    /// whose block size is validated at construction.
    #[inline]
    pub fn block_coord(&self, block_size: u32) -> BlockCoord {
        assert!(block_size > 0, "block_size must be positive");
        let bs = i64::from(block_size);
        // div_euclid == floor division for a positive divisor, so negative
        // coordinates land in block -1 rather than block 0.
        BlockCoord {
            xb: i64::from(self.x).div_euclid(bs),
            yb: i64::from(self.y).div_euclid(bs),
            zb: i64::from(self.z).div_euclid(bs),
        }
    }

    #[inline]
    pub fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[i32; 3]> for Point {
    fn from(v: [i32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Point> for [i32; 3] {
    fn from(p: Point) -> Self {
        p.to_array()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Address of a cubical block in the block grid.
///
/// Renders as `"{xb}_{yb}_{zb}"`, the file name used under `{dataset}/blocks/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockCoord {
    pub xb: i64,
    pub yb: i64,
    pub zb: i64,
}

impl fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.xb, self.yb, self.zb)
    }
}
