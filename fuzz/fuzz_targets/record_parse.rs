#![no_main]

use libfuzzer_sys::fuzz_target;
use tlsmith_proto::{RecordLayer, defragment};

fuzz_target!(|data: &[u8]| {
    // Record decoding must terminate on any input without panicking.
    let layer = RecordLayer::default();

    let parsed = layer.parse_records(data);
    let total: usize = parsed.records.iter().map(|r| r.fragment.len()).sum();
    assert!(total <= data.len());

    let (complete, consumed) = layer.parse_complete_records(data);
    assert!(consumed <= data.len());

    // Re-encoding complete records reproduces the consumed prefix.
    assert_eq!(layer.encode(&complete).as_ref(), &data[..consumed]);

    let _ = defragment(&parsed.records);
});
