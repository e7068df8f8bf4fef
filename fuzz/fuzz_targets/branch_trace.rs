#![no_main]

use libfuzzer_sys::fuzz_target;
use tlsmith_agent::{parse_branch_trace, termination};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(trace) = parse_branch_trace(text) {
        let _ = termination(&trace);
        let transitions: u64 = trace.edges.values().sum();
        assert!(transitions as usize <= text.lines().count());
    }
});
