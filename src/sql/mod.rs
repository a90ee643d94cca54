//! SQL dialect: lexer → grammar → statement tree → importer, plus the DDL
//! generator and a statement formatter.

pub mod ast;
mod dialect;
pub mod formatter;
mod generator;
mod importer;
pub mod lexer;
pub mod parser;
mod types;

pub use dialect::SqlDialect;
pub use formatter::{format_statements, FormattedStatement};
pub use importer::{select_entities, QueryEntity};
pub use parser::parse_statements;
pub use types::{normalize_type, spell_type};

use crate::diagnostic::ParseResult;
use crate::error::GenerateError;
use crate::model::Database;

/// Parse a SQL script into a schema. `Auto` picks the dialect from content.
pub fn parse(input: &str, dialect: SqlDialect) -> ParseResult<Database> {
    let dialect = dialect.resolve(input);
    parse_statements(input).and_then(|statements| importer::import(&statements, dialect))
}

pub fn generate(db: &Database, dialect: SqlDialect) -> Result<String, GenerateError> {
    generator::generate(db, dialect)
}
