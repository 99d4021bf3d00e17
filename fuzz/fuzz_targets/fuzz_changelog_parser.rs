#![no_main]

use libfuzzer_sys::fuzz_target;
use pkgdelta_core::changelog::storage::{dump_changelog_str, parse_changelog_str};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Whatever parses must survive a dump and reparse
        if let Ok(actions) = parse_changelog_str(text) {
            if let Ok(dumped) = dump_changelog_str(&actions) {
                let reparsed = parse_changelog_str(&dumped).expect("dumped actions must parse");
                assert_eq!(reparsed.len(), actions.len());
            }
        }
    }
});
