//! Fuzz target for reading, cleaning and validating arbitrary files.
//!
//! Whatever the bytes, the reader either errors or yields a table, and
//! validation classifies every cleaned record exactly once.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stageline::input::{Cleaner, Parser};
use stageline::{SourceConfig, ValidationPipeline};

fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 {
        return;
    }

    let parser = Parser::new();
    for delimiter in [b',', b'\t', b';'] {
        let Ok(table) = parser.parse_bytes(data, delimiter) else {
            continue;
        };

        let source = SourceConfig::new("fuzz", "fuzz.csv");
        let Ok(rules) = source.rule_set() else {
            return;
        };
        let (records, _) = Cleaner::new(&source.table_schema())
            .with_mapping(source.column_mapping.clone())
            .with_placeholders(source.null_placeholders.clone())
            .clean(&table);

        let input = records.len();
        let outcome = ValidationPipeline::new("fuzz", rules).validate(records);
        assert_eq!(outcome.total(), input);
    }
});
