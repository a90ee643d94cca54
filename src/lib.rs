pub mod aml;
pub mod diagnostic;
pub mod diagram;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod id;
pub mod interchange;
pub mod model;
pub mod sql;

use wasm_bindgen::prelude::*;

use diagnostic::{Diagnostic, DiagnosticKind, ParseResult, Position};
use diagram::DetailLevel;
use dialect::Dialect;
use diff::DatabaseDiff;
use error::GenerateError;
use model::Database;
use tracing::debug;

/// Parse `input` written in `dialect` into the schema model.
pub fn parse(dialect: Dialect, input: &str) -> ParseResult<Database> {
    let result = dialect.parse(input);
    debug!(
        dialect = dialect.as_str(),
        entities = result.value().map_or(0, |db| db.entities.len()),
        diagnostics = result.diagnostics.len(),
        "parsed schema"
    );
    result
}

/// [`parse`] with the dialect given by its tag. An unknown tag yields a
/// failed result carrying an `UnsupportedDialect` diagnostic.
pub fn parse_tagged(tag: &str, input: &str) -> ParseResult<Database> {
    match Dialect::from_str(tag) {
        Some(dialect) => parse(dialect, input),
        None => ParseResult::failure(vec![Diagnostic::error(
            DiagnosticKind::UnsupportedDialect,
            format!("Unknown dialect {}", tag),
            Position::default(),
        )]),
    }
}

/// Write `db` in `dialect`. Diagrams show every attribute.
pub fn generate(dialect: Dialect, db: &Database) -> Result<String, GenerateError> {
    generate_with(dialect, db, DetailLevel::All)
}

pub fn generate_with(dialect: Dialect, db: &Database, detail: DetailLevel) -> Result<String, GenerateError> {
    debug!(dialect = dialect.as_str(), detail = detail.as_str(), entities = db.entities.len(), "generating schema");
    dialect.generate(db, detail)
}

pub fn diff(left: &Database, right: &Database) -> DatabaseDiff {
    let result = diff::diff(left, right);
    debug!(
        entities = result.entities.left.len() + result.entities.right.len() + result.entities.both.len(),
        relations = result.relations.left.len() + result.relations.right.len() + result.relations.both.len(),
        "diffed schemas"
    );
    result
}

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&message.to_string()).into()
}

fn js_dialect(tag: &str) -> Result<Dialect, JsValue> {
    Dialect::from_str(tag).ok_or_else(|| js_error(GenerateError::UnknownDialect(tag.to_string())))
}

/// Parse schema text; returns the parse result (value and diagnostics) as JSON.
#[wasm_bindgen(js_name = "parseSchema")]
pub fn parse_schema(dialect: &str, source: &str) -> Result<String, JsValue> {
    serde_json::to_string(&parse_tagged(dialect, source)).map_err(js_error)
}

/// Generate schema text from a model encoded as interchange JSON.
#[wasm_bindgen(js_name = "generateSchema")]
pub fn generate_schema(dialect: &str, json: &str, detail: Option<String>) -> Result<String, JsValue> {
    let dialect = js_dialect(dialect)?;
    let db: Database = serde_json::from_str(json).map_err(js_error)?;
    let detail = detail
        .as_deref()
        .and_then(DetailLevel::from_str)
        .unwrap_or_default();
    generate_with(dialect, &db, detail).map_err(js_error)
}

/// Diff two models encoded as interchange JSON; returns the diff as JSON.
#[wasm_bindgen(js_name = "diffSchemas")]
pub fn diff_schemas(left: &str, right: &str) -> Result<String, JsValue> {
    let left: Database = serde_json::from_str(left).map_err(js_error)?;
    let right: Database = serde_json::from_str(right).map_err(js_error)?;
    serde_json::to_string(&diff(&left, &right)).map_err(js_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_is_a_parse_diagnostic() {
        let result = parse_tagged("cobol", "users\n  id int\n");
        assert!(result.value().is_none());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnsupportedDialect);
        assert!(result.diagnostics[0].message.contains("cobol"));

        let json = parse_schema("cobol", "").unwrap();
        assert!(json.contains("unsupported_dialect"));
    }

    #[test]
    fn test_known_tag_parses() {
        let result = parse_tagged("aml", "users\n  id int pk\n");
        assert!(result.is_clean());
        assert_eq!(result.into_value().unwrap().entities.len(), 1);
    }
}
