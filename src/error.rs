//! Generation errors. Parsing reports problems as diagnostics instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    /// The model holds something the target dialect cannot express.
    #[error("{dialect} cannot represent {what}")]
    Unsupported { dialect: &'static str, what: String },
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Formatting failed")]
    Format(#[from] std::fmt::Error),
}

impl GenerateError {
    pub fn unsupported(dialect: &'static str, what: impl Into<String>) -> Self {
        GenerateError::Unsupported {
            dialect,
            what: what.into(),
        }
    }
}
