//! Qualified names and their textual id form.
//!
//! Ids are dot-separated segments read from the right: the last segment is
//! the innermost name (schema, entity or type) and earlier ones fill catalog
//! then database. Segments outside `[a-zA-Z0-9_]` (empty names included) are
//! written inside double quotes, with embedded quotes doubled.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    #[error("Missing attribute path in {0:?}, expected `entity(attribute)`")]
    MissingAttributePath(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl Namespace {
    pub fn schema(schema: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.database.is_none() && self.catalog.is_none() && self.schema.is_none()
    }

    fn from_segments(segments: &[Option<String>]) -> Self {
        let mut rev = segments.iter().rev().cloned();
        let schema = rev.next().flatten();
        let catalog = rev.next().flatten();
        let database = rev.next().flatten();
        Self {
            database,
            catalog,
            schema,
        }
    }

    /// Segments from the outermost present field down to `schema`.
    fn segments(&self) -> Vec<Option<&str>> {
        let fields = [
            self.database.as_deref(),
            self.catalog.as_deref(),
            self.schema.as_deref(),
        ];
        match fields.iter().position(Option::is_some) {
            Some(first) => fields[first..].to_vec(),
            None => Vec::new(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_segments(f, &self.segments())
    }
}

impl FromStr for Namespace {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Namespace::from_segments(&split_segments(s)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(flatten)]
    pub namespace: Namespace,
    pub entity: String,
}

impl EntityRef {
    pub fn new(namespace: Namespace, entity: impl Into<String>) -> Self {
        Self {
            namespace,
            entity: entity.into(),
        }
    }

    pub fn named(entity: impl Into<String>) -> Self {
        Self::new(Namespace::default(), entity)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments = self.namespace.segments();
        segments.push(Some(self.entity.as_str()));
        write_segments(f, &segments)
    }
}

impl FromStr for EntityRef {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, namespace) = split_named(s);
        Ok(EntityRef::new(namespace, name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(flatten)]
    pub namespace: Namespace,
    #[serde(rename = "type")]
    pub name: String,
}

impl TypeRef {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments = self.namespace.segments();
        segments.push(Some(self.name.as_str()));
        write_segments(f, &segments)
    }
}

impl FromStr for TypeRef {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, namespace) = split_named(s);
        Ok(TypeRef::new(namespace, name))
    }
}

/// Path to a possibly nested attribute, e.g. `details.address.street`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    /// Panics on an empty path: paths always name at least one attribute.
    pub fn new(names: Vec<String>) -> Self {
        assert!(!names.is_empty(), "attribute path cannot be empty");
        Self(names)
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn head(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut names = self.0.clone();
        names.push(name.into());
        Self(names)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for AttributePath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AttributePath(s.split('.').map(str::to_string).collect()))
    }
}

impl From<&str> for AttributePath {
    fn from(s: &str) -> Self {
        AttributePath(s.split('.').map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    #[serde(flatten)]
    pub entity: EntityRef,
    pub attribute: AttributePath,
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.entity, self.attribute)
    }
}

impl FromStr for AttributeRef {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let open = find_unquoted(s, '(').ok_or_else(|| IdError::MissingAttributePath(s.to_string()))?;
        let inner = s[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| IdError::MissingAttributePath(s.to_string()))?;
        let (entity, namespace) = split_named(&s[..open]);
        Ok(AttributeRef {
            entity: EntityRef::new(namespace, entity),
            attribute: AttributePath::from(inner),
        })
    }
}

/// True when `name` can be written without quotes.
pub fn is_plain(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn quote(name: &str) -> String {
    if is_plain(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn write_segments(f: &mut fmt::Formatter<'_>, segments: &[Option<&str>]) -> fmt::Result {
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            f.write_str(".")?;
        }
        if let Some(name) = segment {
            f.write_str(&quote(name))?;
        }
    }
    Ok(())
}

/// Splits on unquoted dots. Unquoted empty segments are absent (`None`),
/// quoted ones are present even when empty.
fn split_segments(s: &str) -> Vec<Option<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' && current.is_empty() && !quoted {
            in_quotes = true;
            quoted = true;
        } else if c == '.' {
            segments.push(finish_segment(&mut current, quoted));
            quoted = false;
        } else {
            current.push(c);
        }
    }
    segments.push(finish_segment(&mut current, quoted));
    segments
}

fn finish_segment(current: &mut String, quoted: bool) -> Option<String> {
    let text = std::mem::take(current);
    if quoted || !text.is_empty() {
        Some(text)
    } else {
        None
    }
}

/// Last segment as the name, the rest as namespace.
fn split_named(s: &str) -> (String, Namespace) {
    let mut segments = split_segments(s);
    let name = segments.pop().flatten().unwrap_or_default();
    (name, Namespace::from_segments(&segments))
}

/// Splits on `sep` outside double quotes. Pieces keep their quotes.
pub fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            pieces.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    pieces.push(&s[start..]);
    pieces
}

fn find_unquoted(s: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == target && !in_quotes {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ns(database: Option<&str>, catalog: Option<&str>, schema: Option<&str>) -> Namespace {
        Namespace {
            database: database.map(String::from),
            catalog: catalog.map(String::from),
            schema: schema.map(String::from),
        }
    }

    #[test]
    fn test_format_namespace() {
        assert_eq!(ns(None, None, None).to_string(), "");
        assert_eq!(ns(None, None, Some("public")).to_string(), "public");
        assert_eq!(ns(Some("db"), None, Some("public")).to_string(), "db..public");
        assert_eq!(ns(None, Some("cat"), Some("s")).to_string(), "cat.s");
        assert_eq!(ns(Some("db"), None, None).to_string(), "db..");
        assert_eq!(ns(None, None, Some("my schema")).to_string(), "\"my schema\"");
    }

    #[test]
    fn test_parse_namespace() {
        let parsed: Namespace = "db..public".parse().unwrap();
        assert_eq!(parsed, ns(Some("db"), None, Some("public")));
        let parsed: Namespace = "a.b.c.d".parse().unwrap();
        assert_eq!(parsed, ns(Some("b"), Some("c"), Some("d")));
        let parsed: Namespace = "\"my.schema\"".parse().unwrap();
        assert_eq!(parsed, ns(None, None, Some("my.schema")));
    }

    #[test]
    fn test_entity_ref_collapses_to_name() {
        assert_eq!(EntityRef::named("users").to_string(), "users");
        let e = EntityRef::new(Namespace::schema("public"), "users");
        assert_eq!(e.to_string(), "public.users");
        assert_eq!("public.users".parse::<EntityRef>().unwrap(), e);
        assert_eq!(EntityRef::named("").to_string(), "\"\"");
        assert_eq!("\"\"".parse::<EntityRef>().unwrap(), EntityRef::named(""));
    }

    #[test]
    fn test_unnecessary_quotes_are_stripped() {
        let e: EntityRef = "\"public\".\"users\"".parse().unwrap();
        assert_eq!(e.to_string(), "public.users");
    }

    #[test]
    fn test_attribute_ref() {
        let r = AttributeRef {
            entity: EntityRef::new(Namespace::schema("public"), "users"),
            attribute: AttributePath::from("details.address"),
        };
        assert_eq!(r.to_string(), "public.users(details.address)");
        assert_eq!("public.users(details.address)".parse::<AttributeRef>().unwrap(), r);

        let empty = AttributeRef {
            entity: EntityRef::named("users"),
            attribute: AttributePath::name(""),
        };
        assert_eq!(empty.to_string(), "users()");
        assert_eq!("users()".parse::<AttributeRef>().unwrap(), empty);
        assert!("users".parse::<AttributeRef>().is_err());
    }

    #[test]
    fn test_split_unquoted() {
        assert_eq!(split_unquoted("small, \"a,b\"", ','), vec!["small", " \"a,b\""]);
        assert_eq!(split_unquoted("\"say \"\"hi,\"\"\",x", ','), vec!["\"say \"\"hi,\"\"\"", "x"]);
        assert_eq!(split_unquoted("a.\"b.c\"", '.'), vec!["a", "\"b.c\""]);
        assert_eq!(split_unquoted("", ','), vec![""]);
    }

    #[test]
    fn test_quoted_parenthesis_in_entity() {
        let r = AttributeRef {
            entity: EntityRef::named("odd(name"),
            attribute: AttributePath::name("id"),
        };
        assert_eq!(r.to_string().parse::<AttributeRef>().unwrap(), r);
    }

    fn name() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_ .\"()-]{0,6}"
    }

    fn namespace() -> impl Strategy<Value = Namespace> {
        (
            proptest::option::of(name()),
            proptest::option::of(name()),
            proptest::option::of(name()),
        )
            .prop_map(|(database, catalog, schema)| Namespace {
                database,
                catalog,
                schema,
            })
    }

    proptest! {
        #[test]
        fn prop_namespace_round_trip(n in namespace()) {
            prop_assert_eq!(n.to_string().parse::<Namespace>().unwrap(), n);
        }

        #[test]
        fn prop_entity_ref_round_trip(n in namespace(), entity in name()) {
            let e = EntityRef::new(n, entity);
            prop_assert_eq!(e.to_string().parse::<EntityRef>().unwrap(), e);
        }

        #[test]
        fn prop_type_ref_round_trip(n in namespace(), ty in name()) {
            let t = TypeRef::new(n, ty);
            prop_assert_eq!(t.to_string().parse::<TypeRef>().unwrap(), t);
        }

        #[test]
        fn prop_attribute_ref_round_trip(
            n in namespace(),
            entity in name(),
            path in proptest::collection::vec("[a-zA-Z0-9_]{0,5}", 1..4),
        ) {
            let r = AttributeRef { entity: EntityRef::new(n, entity), attribute: AttributePath::new(path) };
            prop_assert_eq!(r.to_string().parse::<AttributeRef>().unwrap(), r);
        }

        #[test]
        fn prop_format_parse_idempotent(s in "[a-z\".]{0,10}") {
            let once = s.parse::<EntityRef>().unwrap().to_string();
            let twice = once.parse::<EntityRef>().unwrap().to_string();
            prop_assert_eq!(once, twice);
        }
    }
}
