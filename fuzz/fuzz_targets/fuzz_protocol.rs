#![no_main]

use libfuzzer_sys::fuzz_target;

use pireduce_core::protocol::serve;
use pireduce_core::{FnKernel, Segment};

fuzz_target!(|data: &[u8]| {
    // Arbitrary input must produce an error or a clean stop, never a panic.
    let mut input = data;
    let mut output = Vec::new();
    // Requests may name enormous segments; count them instead of summing.
    let kernel = FnKernel::new("count", |segment: Segment| Ok(segment.count as f64));
    let _ = serve(&mut input, &mut output, &kernel);
});
