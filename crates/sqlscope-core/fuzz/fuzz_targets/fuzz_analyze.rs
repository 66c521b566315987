//! Fuzz target for the analyzer.
//!
//! `analyze()` must never panic on arbitrary SQL; every failure belongs in
//! the result's issues vector.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sqlscope_core::{analyze, AnalyzeRequest, Dialect};

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
    let request = AnalyzeRequest::new(input.sql.clone(), input.dialect());
    let _result = analyze(&request);
});
