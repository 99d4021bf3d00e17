#![no_main]

use libfuzzer_sys::fuzz_target;
use pkgdelta_core::changelog::BumpType;
use pkgdelta_core::version::PkgVersion;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(version) = PkgVersion::parse(text) {
            let rendered = version.to_string();
            assert_eq!(PkgVersion::parse(&rendered).ok(), Some(version.clone()));

            for bump in [BumpType::Patch, BumpType::Minor, BumpType::Major, BumpType::Rc] {
                let _ = version.bump(bump);
            }
        }
    }
});
