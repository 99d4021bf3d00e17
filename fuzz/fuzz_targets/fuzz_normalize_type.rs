#![no_main]

use libfuzzer_sys::fuzz_target;
use pkgdelta_core::api::normalize::normalize_str;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Never panics, and a second pass changes nothing
        let once = normalize_str(text);
        let twice = normalize_str(&once);
        assert_eq!(once, twice, "normalization not idempotent for {:?}", text);
    }
});
