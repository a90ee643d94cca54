//! Interchange JSON: the serde encoding of [`Database`].

use crate::diagnostic::{Diagnostic, DiagnosticKind, Location, ParseResult, Position, Span};
use crate::error::GenerateError;
use crate::model::Database;
use serde::de::DeserializeOwned;

pub fn parse(input: &str) -> ParseResult<Database> {
    decode::<Database>(input).and_then(|db| {
        let diagnostics = db.validate();
        ParseResult::partial(db, diagnostics)
    })
}

pub fn generate(db: &Database) -> Result<String, GenerateError> {
    let mut output = serde_json::to_string_pretty(db)?;
    output.push('\n');
    Ok(output)
}

/// Deserializes `input`, turning a serde failure into a positioned
/// `invalid_json` error.
pub fn decode<T: DeserializeOwned>(input: &str) -> ParseResult<T> {
    match serde_json::from_str(input) {
        Ok(value) => ParseResult::success(value),
        Err(err) => ParseResult::failure(vec![Diagnostic::error(
            DiagnosticKind::InvalidJson,
            err.to_string(),
            error_position(input, err.line(), err.column()),
        )]),
    }
}

/// serde_json reports 1-based line and column; the column may sit one past
/// the end of the line at end of input.
fn error_position(input: &str, line: usize, column: usize) -> Position {
    if line == 0 {
        return Position::default();
    }
    let line_start: usize = input.split('\n').take(line - 1).map(|l| l.len() + 1).sum();
    let offset = (line_start + column.saturating_sub(1)).min(input.len());
    let location = Location::new(line, column.max(1));
    Position::new(
        Span {
            start: offset,
            end: offset,
        },
        location,
        location,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{AttributePath, Namespace};
    use crate::model::{Attribute, Entity, PrimaryKey};

    #[test]
    fn test_round_trip() {
        let mut users = Entity::new(Namespace::schema("app"), "users");
        users.attrs.push(Attribute::new("id", "uuid"));
        users.pk = Some(PrimaryKey {
            name: None,
            attrs: vec![AttributePath::name("id")],
        });
        let db = Database {
            entities: vec![users],
            ..Database::default()
        };

        let text = generate(&db).unwrap();
        assert!(text.contains("\"schema\": \"app\""));
        assert!(!text.contains("relations"));
        let parsed = parse(&text);
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.into_value(), Some(db));
    }

    #[test]
    fn test_syntax_error_position() {
        let result = parse("{\n  \"entities\": [\n    {\"name\": }\n  ]\n}");
        assert!(result.value().is_none());
        let error = &result.diagnostics[0];
        assert_eq!(error.kind, DiagnosticKind::InvalidJson);
        assert_eq!(error.position.start.line, 3);
        assert!(error.position.offset.start > 0);
    }

    #[test]
    fn test_validation_warnings() {
        let result = parse(
            r#"{"entities": [{"name": "posts", "attrs": [{"name": "id", "type": "int"}], "pk": {"attrs": [["uid"]]}}]}"#,
        );
        assert!(result.value().is_some());
        let warnings: Vec<_> = result.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, DiagnosticKind::UnknownAttribute);
    }
}
