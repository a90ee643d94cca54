//! SQL dialect detection and identifier quoting.

use super::lexer::Keyword;

const POSTGRES_HEADERS: &[&str] = &["postgresql database dump", "pg_dump", "-- postgres"];
const MYSQL_HEADERS: &[&str] = &["mysql dump", "mysqldump", "-- mysql", "mariadb dump"];
const POSTGRES_KEYWORDS: &[&str] = &["serial", "text[]", "::", "timestamptz", "comment on ", "jsonb", "create type"];
const MYSQL_KEYWORDS: &[&str] = &["auto_increment", "tinyint", "engine=", "unsigned", "`"];

/// Flavor of SQL read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    /// Detected from content on parse, generic on generate.
    #[default]
    Auto,
    Generic,
    PostgreSQL,
    MySQL,
}

impl SqlDialect {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "generic" | "sql" => Some(Self::Generic),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" => Some(Self::MySQL),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Generic => "generic",
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
        }
    }

    /// Dump headers win over type keywords; a script with neither is generic.
    pub fn detect(content: &str) -> Self {
        let lower = content.to_lowercase();
        let found = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        let by_header = [(Self::PostgreSQL, POSTGRES_HEADERS), (Self::MySQL, MYSQL_HEADERS)];
        let by_keyword = [(Self::PostgreSQL, POSTGRES_KEYWORDS), (Self::MySQL, MYSQL_KEYWORDS)];
        by_header
            .into_iter()
            .chain(by_keyword)
            .find(|(_, markers)| found(markers))
            .map_or(Self::Generic, |(dialect, _)| dialect)
    }

    /// Resolve Auto to a concrete dialect.
    pub fn resolve(self, content: &str) -> Self {
        match self {
            Self::Auto => Self::detect(content),
            other => other,
        }
    }

    pub fn quote_char(&self) -> char {
        match self {
            Self::MySQL => '`',
            _ => '"',
        }
    }

    /// Quotes an identifier when it is not a plain lowercase word or spells
    /// a keyword, reserved or not.
    pub fn quote_ident(&self, name: &str) -> String {
        let plain = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if plain && Keyword::from_str(name).is_none() {
            name.to_string()
        } else {
            let q = self.quote_char();
            format!("{q}{}{q}", name.replace(q, &format!("{q}{q}")))
        }
    }
}
