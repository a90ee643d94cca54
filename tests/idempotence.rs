//! Generating from a parsed schema reaches a fixed point after one pass.

mod common;

use common::database;
use proptest::prelude::*;
use schemerd::dialect::Dialect;

fn normalize(dialect: Dialect, text: &str) -> Result<String, TestCaseError> {
    let result = schemerd::parse(dialect, text);
    prop_assert!(!result.has_errors(), "{}: {:?}\n{}", dialect.as_str(), result.diagnostics, text);
    let db = result
        .into_value()
        .ok_or_else(|| TestCaseError::fail(format!("{} parse returned no value", dialect.as_str())))?;
    schemerd::generate(dialect, &db).map_err(|e| TestCaseError::fail(e.to_string()))
}

proptest! {
    #[test]
    fn test_generation_is_idempotent(db in database()) {
        for dialect in [Dialect::Aml, Dialect::PostgreSQL, Dialect::Json] {
            let text = schemerd::generate(dialect, &db).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let once = normalize(dialect, &text)?;
            let twice = normalize(dialect, &once)?;
            prop_assert_eq!(&once, &twice, "{} output is not stable", dialect.as_str());
        }
    }
}
