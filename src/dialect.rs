//! Dialect tags and the table that maps each one to its parser and
//! generator.

use crate::diagnostic::{Diagnostic, DiagnosticKind, ParseResult, Position};
use crate::diagram::{self, DetailLevel};
use crate::error::GenerateError;
use crate::model::Database;
use crate::sql::SqlDialect;
use crate::{aml, interchange, sql};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Aml,
    /// SQL with the flavor detected from content.
    Sql,
    PostgreSQL,
    MySQL,
    /// Serde encoding of the schema model.
    Json,
    /// Relational-modeling AST as JSON.
    Ast,
    Dot,
    Mermaid,
    Markdown,
}

pub type ParseFn = fn(&str) -> ParseResult<Database>;
pub type GenerateFn = fn(&Database, DetailLevel) -> Result<String, GenerateError>;

pub struct Entry {
    pub dialect: Dialect,
    /// `None` for generation-only dialects.
    pub parse: Option<ParseFn>,
    pub generate: GenerateFn,
}

static REGISTRY: &[Entry] = &[
    Entry {
        dialect: Dialect::Aml,
        parse: Some(aml::parse),
        generate: |db, _| Ok(aml::generate(db)),
    },
    Entry {
        dialect: Dialect::Sql,
        parse: Some(|input| sql::parse(input, SqlDialect::Auto)),
        generate: |db, _| sql::generate(db, SqlDialect::Generic),
    },
    Entry {
        dialect: Dialect::PostgreSQL,
        parse: Some(|input| sql::parse(input, SqlDialect::PostgreSQL)),
        generate: |db, _| sql::generate(db, SqlDialect::PostgreSQL),
    },
    Entry {
        dialect: Dialect::MySQL,
        parse: Some(|input| sql::parse(input, SqlDialect::MySQL)),
        generate: |db, _| sql::generate(db, SqlDialect::MySQL),
    },
    Entry {
        dialect: Dialect::Json,
        parse: Some(interchange::json::parse),
        generate: |db, _| interchange::json::generate(db),
    },
    Entry {
        dialect: Dialect::Ast,
        parse: Some(interchange::ast::parse),
        generate: |db, _| interchange::ast::generate(db),
    },
    Entry {
        dialect: Dialect::Dot,
        parse: None,
        generate: diagram::dot::generate,
    },
    Entry {
        dialect: Dialect::Mermaid,
        parse: None,
        generate: diagram::mermaid::generate,
    },
    Entry {
        dialect: Dialect::Markdown,
        parse: None,
        generate: diagram::markdown::generate,
    },
];

impl Dialect {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "aml" => Some(Self::Aml),
            "sql" => Some(Self::Sql),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" => Some(Self::MySQL),
            "json" => Some(Self::Json),
            "ast" => Some(Self::Ast),
            "dot" | "graphviz" => Some(Self::Dot),
            "mermaid" => Some(Self::Mermaid),
            "markdown" | "md" => Some(Self::Markdown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aml => "aml",
            Self::Sql => "sql",
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::Json => "json",
            Self::Ast => "ast",
            Self::Dot => "dot",
            Self::Mermaid => "mermaid",
            Self::Markdown => "markdown",
        }
    }

    fn entry(&self) -> Option<&'static Entry> {
        REGISTRY.iter().find(|e| e.dialect == *self)
    }

    /// Dialects that can be read.
    pub fn parsers() -> impl Iterator<Item = Dialect> {
        REGISTRY.iter().filter(|e| e.parse.is_some()).map(|e| e.dialect)
    }

    /// Dialects that can be written, parse dialects included.
    pub fn generators() -> impl Iterator<Item = Dialect> {
        REGISTRY.iter().map(|e| e.dialect)
    }

    pub fn parse(&self, input: &str) -> ParseResult<Database> {
        match self.entry().and_then(|e| e.parse) {
            Some(parse) => parse(input),
            None => ParseResult::failure(vec![Diagnostic::error(
                DiagnosticKind::UnsupportedDialect,
                format!("{} can only be generated", self.as_str()),
                Position::default(),
            )]),
        }
    }

    pub fn generate(&self, db: &Database, detail: DetailLevel) -> Result<String, GenerateError> {
        match self.entry() {
            Some(entry) => (entry.generate)(db, detail),
            None => Err(GenerateError::UnknownDialect(self.as_str().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for dialect in Dialect::generators() {
            assert_eq!(Dialect::from_str(dialect.as_str()), Some(dialect));
        }
        assert_eq!(Dialect::from_str("PostgreSQL"), Some(Dialect::PostgreSQL));
        assert_eq!(Dialect::from_str("yaml"), None);
    }

    #[test]
    fn test_generation_only_dialects() {
        let parsers: Vec<_> = Dialect::parsers().collect();
        assert!(parsers.contains(&Dialect::Aml));
        assert!(!parsers.contains(&Dialect::Mermaid));
        assert_eq!(Dialect::generators().count(), 9);

        let result = Dialect::Dot.parse("digraph {}");
        assert!(result.value().is_none());
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnsupportedDialect);
    }

    #[test]
    fn test_dispatch() {
        let db = Dialect::Aml.parse("users\n  id int pk\n").into_value().unwrap();
        let sql = Dialect::PostgreSQL.generate(&db, DetailLevel::All).unwrap();
        assert!(sql.contains("CREATE TABLE users"));
        let mermaid = Dialect::Mermaid.generate(&db, DetailLevel::All).unwrap();
        assert!(mermaid.starts_with("erDiagram"));
    }
}
