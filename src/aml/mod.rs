//! AML, the indentation-based schema language: one block per entity, one
//! line per attribute.

mod generator;
pub mod lexer;
mod parser;

pub use parser::is_known_type;

use crate::diagnostic::ParseResult;
use crate::model::Database;

pub fn parse(input: &str) -> ParseResult<Database> {
    parser::parse(input)
}

pub fn generate(db: &Database) -> String {
    generator::generate(db)
}
