#![no_main]

use libfuzzer_sys::fuzz_target;
use sigsearch_core::{Block, DatasetMetadata, Point, SampleRecord, RECORD_SIZE};

fuzz_target!(|data: &[u8]| {
    let block = Block::new(data);
    assert_eq!(block.len(), data.len() / RECORD_SIZE);
    assert_eq!(block.iter().len(), block.len());

    if let Some(first) = block.get(0) {
        let query = first.point;
        let hit = block.nearest(&query, 0.0).expect("first record matches itself");
        assert_eq!(hit.distance, 0.0);
        // ties keep the earliest record
        assert_eq!(hit.index, 0);
        assert_eq!(SampleRecord::read_from(data).ok(), Some(first));
    }
    let _ = block.nearest(&Point::new(0, 0, 0), f64::INFINITY);

    let _ = DatasetMetadata::from_json_slice(data);
});
