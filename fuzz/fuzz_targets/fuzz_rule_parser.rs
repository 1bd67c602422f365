//! Fuzz target for rule code compilation.
//!
//! Goal: compiling policy code should **never panic** on any input.
//! It may return errors, but panics are unacceptable.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_rule_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = admitguard_domain::rule::compile(text, &[]);
        let _ = admitguard_domain::rule::compile(text, &["registry", "max"]);
    }
});
