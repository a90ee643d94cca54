//! Interchange dialects: the model's own JSON encoding and the external
//! relational-modeling AST.

pub mod ast;
pub mod json;

pub use ast::Group;
