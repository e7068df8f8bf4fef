#![no_main]

use libfuzzer_sys::fuzz_target;
use tlsmith_core::{
    TlsConfig, TlsContext,
    pipeline::{self, Adjustment},
};

fuzz_target!(|data: &[u8]| {
    // First byte selects the content type, the rest is the record payload.
    let Some((&content_type, payload)) = data.split_first() else {
        return;
    };

    let mut context = TlsContext::new("fuzz", TlsConfig::default());
    let messages = pipeline::parse_content(content_type, payload, &mut context, Adjustment::Apply);

    // Every input byte ends up in exactly one message.
    let covered: usize = messages
        .iter()
        .filter_map(|m| m.complete_resulting_message())
        .map(|b| b.len())
        .sum();
    assert_eq!(covered, payload.len());
});
