//! Fuzz target: parse, link, and optimize arbitrary Glass source.
//!
//! Execution is deliberately skipped — Glass has no step limit, so an
//! arbitrary program may loop forever. Parsing and linking must only ever
//! return errors, never panic.
//!
//! Pedantic mode keeps the fuzzer away from include strings, which would
//! otherwise touch the filesystem with arbitrary paths.

#![no_main]

use libfuzzer_sys::fuzz_target;

use glass::{Options, Runner};

fuzz_target!(|data: &[u8]| {
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };

    // Skip excessively large inputs.
    if code.len() > 8192 {
        return;
    }

    let options = Options {
        pedantic: true,
        ..Options::default()
    };
    // Only the absence of panics matters here.
    let _ = Runner::from_source(code, "fuzz.glass", &options);
});
