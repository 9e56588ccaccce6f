#![allow(dead_code)]

use std::collections::BTreeMap;

use sigsearch::query::MemoryEngine;
use sigsearch::store::{block_key, metadata_key, MemoryBlockStore};
use sigsearch_core::{BlockWriter, DatasetMetadata, Point, SampleRecord};

pub const DATASET: &str = "mb20";
pub const SUFFIX: &str = "_imgsearch";

pub const TARGET_POINT: Point = Point::new(18416, 16369, 26467);
pub const TARGET_SIGNATURE: i64 = 0x1122_3344_5566_7788;

pub fn byte_masks() -> DatasetMetadata {
    DatasetMetadata::new(1000, [0xFF, 0xFF00, 0xFF0000, 0xFF000000]).unwrap()
}

/// Write `info.json` and one block file per occupied block, records in input order.
pub fn publish<F>(dataset: &str, meta: &DatasetMetadata, samples: &[(Point, i64)], mut put: F)
where
    F: FnMut(String, Vec<u8>),
{
    put(metadata_key(dataset), meta.to_json_vec());

    let mut blocks: BTreeMap<String, BlockWriter> = BTreeMap::new();
    for (point, signature) in samples {
        let key = block_key(dataset, &meta.block_coord(point));
        blocks
            .entry(key)
            .or_default()
            .push(SampleRecord::new(*point, *signature));
    }
    for (key, writer) in blocks {
        put(key, writer.finish());
    }
}

/// Target sample plus neighbours at known Hamming distances.
///
/// Masks cover the low four bytes, so flips above bit 31 keep every
/// partition and flips in byte 0 keep partitions 1..3.
pub fn neighbourhood() -> Vec<(Point, i64)> {
    vec![
        (TARGET_POINT, TARGET_SIGNATURE),
        // hamming 1, far away
        (Point::new(1000, 1000, 1000), TARGET_SIGNATURE ^ (1 << 40)),
        // hamming 2
        (Point::new(2000, 2000, 2000), TARGET_SIGNATURE ^ (0b11 << 48)),
        // hamming 1 via byte 0: absent from table 0's partition
        (Point::new(3000, 3000, 3000), TARGET_SIGNATURE ^ (1 << 3)),
        // hamming 1 but spatially next to the target
        (Point::new(18420, 16369, 26467), TARGET_SIGNATURE ^ (1 << 33)),
        // hamming 8: outside the exclusive bound
        (Point::new(4000, 4000, 4000), TARGET_SIGNATURE ^ (0xFF << 40)),
        // hamming 7
        (Point::new(5000, 5000, 5000), TARGET_SIGNATURE ^ (0x7F << 40)),
    ]
}

pub fn memory_fixture(samples: &[(Point, i64)]) -> (MemoryBlockStore, MemoryEngine) {
    let meta = byte_masks();
    let store = MemoryBlockStore::new();
    publish(DATASET, &meta, samples, |key, bytes| store.put(key, bytes));

    let engine = MemoryEngine::new();
    for (point, signature) in samples {
        engine.index_sample(DATASET, SUFFIX, &meta, *point, *signature);
    }
    (store, engine)
}
