//! Signature partitioning for approximate Hamming search
//!
//! Each dataset carries four masks. A signature is projected through every
//! mask, the projection is mixed with the MurmurHash3 64-bit finalizer, and
//! the result is reduced modulo [`PARTITIONS`]. Two signatures within a small
//! Hamming distance agree on at least one masked projection with high
//! probability, so searching the four matching partitions finds most true
//! neighbours without scanning the whole dataset.
//!
//! The partition tables were built with exactly this function. Any deviation
//! (signed arithmetic, a different modulus, a different mixer) sends queries
//! to the wrong partitions and silently loses matches.

use crate::metadata::{DatasetMetadata, NUM_MASKS};

/// Partitions per mask table
pub const PARTITIONS: u64 = 4000;

/// MurmurHash3 64-bit finalizer (`fmix64`).
///
/// All arithmetic is on the unsigned bit pattern, wrapping at 2^64.
#[inline]
pub const fn finalize(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

/// Partition id of `signature` under a single mask.
#[inline]
pub fn partition(mask: u64, signature: i64) -> u32 {
    // reinterpret, never sign-extend or take the magnitude
    let bits = signature as u64;
    (finalize(mask & bits) % PARTITIONS) as u32
}

/// Partition ids for all four masks of a dataset, each in `[0, PARTITIONS)`.
pub fn partitions(meta: &DatasetMetadata, signature: i64) -> [u32; NUM_MASKS] {
    let mut out = [0u32; NUM_MASKS];
    for (slot, mask) in out.iter_mut().zip(meta.ham_masks().iter()) {
        *slot = partition(*mask, signature);
    }
    out
}

/// Number of differing bits between two signatures
#[inline]
pub fn hamming_distance(a: i64, b: i64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn byte_masks() -> DatasetMetadata {
        DatasetMetadata::new(1000, [0xFF, 0xFF00, 0xFF0000, 0xFF000000]).unwrap()
    }

    #[test]
    fn test_finalize_golden_values() {
        assert_eq!(finalize(0), 0);
        assert_eq!(finalize(1), 0xb456_bcfc_34c2_cb2c);
        assert_eq!(finalize(0x88), 0xb4e3_ff6f_78e6_86be);
        assert_eq!(finalize(123_456_789), 0x8f7c_2920_6384_f886);
        assert_eq!(finalize(u64::MAX), 0x64b5_720b_4b82_5f21);
    }

    #[test]
    fn test_finalize_is_const_evaluable() {
        const H: u64 = finalize(0x7700);
        assert_eq!(H, 0x71b9_835a_c3a5_2f66);
    }

    #[test]
    fn test_partitions_golden_values() {
        let meta = byte_masks();
        assert_eq!(partitions(&meta, 0x1122_3344_5566_7788), [1822, 2118, 992, 1068]);
        assert_eq!(partitions(&meta, 123_456_789), [1011, 2044, 2897, 2287]);
    }

    #[test]
    fn test_negative_signature_uses_raw_bits() {
        let meta = byte_masks();
        // -2 == 0xFFFF_FFFF_FFFF_FFFE
        assert_eq!(partitions(&meta, -2), [3474, 1037, 3571, 530]);
        assert_eq!(partition(u64::MAX, -1), (finalize(u64::MAX) % PARTITIONS) as u32);
        assert_eq!(partition(u64::MAX, -1), 289);
    }

    #[test]
    fn test_partitions_in_range_and_deterministic() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let meta = DatasetMetadata::new(1, [rng.gen(), rng.gen(), rng.gen(), rng.gen()]).unwrap();
            let sig: i64 = rng.gen();
            let first = partitions(&meta, sig);
            assert!(first.iter().all(|p| u64::from(*p) < PARTITIONS));
            assert_eq!(first, partitions(&meta, sig));
        }
    }

    #[test]
    fn test_bits_outside_mask_do_not_move_partition() {
        let meta = byte_masks();
        let base = 0x0000_0000_1234_5678_i64;
        let noisy = base | 0x7F00_0000_0000_0000;
        assert_eq!(partitions(&meta, base), partitions(&meta, noisy));
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0, -1), 64);
        assert_eq!(hamming_distance(0b1010, 0b0110), 2);
        assert_eq!(hamming_distance(i64::MIN, 0), 1);
    }
}
