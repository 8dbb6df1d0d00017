//! Fuzz target for the profile DSL parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_profile_parser
//!
//! The parser never fails on malformed input, so any panic here is a bug.
//! Parsed profiles are also checked for self-parents and misrouted excludes.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let profiles = ctxpack_core::parse_profiles(&text, Path::new("/fuzz"));

    for (name, profile) in &profiles {
        assert_eq!(name, &profile.name);
        assert!(!name.is_empty());
        assert!(!profile.parents.contains(name));
        assert!(profile.exclude_patterns.iter().all(|p| !p.is_empty()));
        assert!(profile.include_patterns.iter().all(|p| !p.starts_with('!')));
    }
});
