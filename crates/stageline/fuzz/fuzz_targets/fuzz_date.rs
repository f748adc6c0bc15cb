//! Fuzz target for date and timestamp parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stageline::record::{DATE_FORMAT, parse_date, parse_timestamp};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    // A parsed date must survive a round trip through its canonical form.
    if let Some(date) = parse_date(&text) {
        let canonical = date.format(DATE_FORMAT).to_string();
        assert_eq!(parse_date(&canonical), Some(date));
    }
    let _ = parse_timestamp(&text);
});
