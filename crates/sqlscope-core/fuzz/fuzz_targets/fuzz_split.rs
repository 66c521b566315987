//! Fuzz target for the statement splitter.
//!
//! Splitting must not panic and every chunk span must slice the input.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sqlscope_core::{split_statements, Dialect};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sql: String,
    dialect_idx: u8,
}

impl FuzzInput {
    fn dialect(&self) -> Dialect {
        match self.dialect_idx % 4 {
            0 => Dialect::Postgres,
            1 => Dialect::Snowflake,
            2 => Dialect::Bigquery,
            _ => Dialect::Ansi,
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let result = split_statements(&input.sql, input.dialect());
    for statement in &result.statements {
        assert!(statement.span.start <= statement.span.end);
        assert!(statement.span.end <= input.sql.len());
        assert_eq!(&input.sql[statement.span.start..statement.span.end], statement.text);
    }
});
