//! Fuzz target: every program that parses must render back to source that
//! parses again.
//!
//! This exercises the converter against the parser: escaping, number
//! formatting, and the inheritance splice must all produce valid Glass. A
//! panic or a second-parse failure is a real bug.

#![no_main]

use libfuzzer_sys::fuzz_target;

use glass::{Options, Runner};

fuzz_target!(|data: &[u8]| {
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };

    if code.len() > 4096 {
        return;
    }

    let options = Options {
        pedantic: true,
        optimize: false,
    };
    let Ok(runner) = Runner::from_source(code, "fuzz.glass", &options) else {
        return;
    };

    let converted = runner.converted(0);
    let converted = String::from_utf8(converted).unwrap_or_else(|_| {
        // Byte strings may not be UTF-8; rendering is still byte-exact, so
        // skip the re-parse in that case.
        String::new()
    });
    if converted.is_empty() {
        return;
    }

    Runner::from_source(&converted, "fuzz2.glass", &options)
        .expect("converted source must re-parse");
});
