#![no_main]

use libfuzzer_sys::fuzz_target;

use pireduce_core::segment_all;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let total = u64::from(u32::from_le_bytes([data[0], data[1], data[2], data[3]]));
    let size = u64::from(u32::from_le_bytes([data[4], data[5], data[6], data[7]]));
    // Keep the segment count bounded for speed.
    if size > 0 && total.div_ceil(size) > 1 << 16 {
        return;
    }

    let Ok(segments) = segment_all(total, size) else {
        assert_eq!(size, 0);
        return;
    };
    let mut next = 0;
    for segment in &segments {
        assert_eq!(segment.start, next);
        assert!(segment.count > 0 && segment.count <= size);
        next = segment.end();
    }
    assert_eq!(next, total);
});
