#![no_main]
use libfuzzer_sys::fuzz_target;

use apicov::descriptor::{self, OpenTypes};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(decoded) = descriptor::decode(text, &OpenTypes) {
        // Re-encoding normalizes package separators but keeps the types
        let encoded = descriptor::encode(&decoded.0, &decoded.1);
        assert_eq!(descriptor::decode(&encoded, &OpenTypes).ok(), Some(decoded));
    }
    let _ = descriptor::humanize("m", text);
    let _ = descriptor::humanize_full("m", text);
    let _ = descriptor::JavaType::parse_source_name(text);
});
