//! AML grammar.
//!
//! Column-0 lines open an entity block or hold a `namespace`, `rel` or
//! `type` directive. Indented lines are attributes of the open block, nested
//! under the closest less-indented attribute. A blank line closes the block.

use super::lexer::{Lexer, Line, Token};
use crate::diagnostic::{Diagnostic, DiagnosticKind, ParseResult, Position};
use crate::id::{split_unquoted, AttributePath, EntityRef, Namespace, TypeRef};
use crate::model::{
    Attribute, Cardinality, Check, Database, Entity, Extra, Index, PrimaryKey, Relation, RelationLink, Type,
};
use std::collections::HashSet;
use std::mem;
use tracing::trace;

/// Type names accepted without a warning, compared on the lowercase base
/// name (parameters and array suffix removed).
const KNOWN_TYPES: &[&str] = &[
    "unknown",
    "uuid",
    "char",
    "character",
    "nchar",
    "varchar",
    "character varying",
    "nvarchar",
    "string",
    "text",
    "tinytext",
    "mediumtext",
    "longtext",
    "citext",
    "int",
    "integer",
    "tinyint",
    "smallint",
    "mediumint",
    "bigint",
    "int2",
    "int4",
    "int8",
    "serial",
    "smallserial",
    "bigserial",
    "number",
    "numeric",
    "decimal",
    "real",
    "float",
    "float4",
    "float8",
    "double",
    "double precision",
    "money",
    "bool",
    "boolean",
    "bit",
    "timestamp",
    "timestamptz",
    "timestamp with time zone",
    "timestamp without time zone",
    "datetime",
    "date",
    "time",
    "timetz",
    "interval",
    "year",
    "json",
    "jsonb",
    "xml",
    "bytea",
    "blob",
    "binary",
    "varbinary",
    "inet",
    "cidr",
    "macaddr",
    "enum",
    "set",
    "geometry",
    "point",
];

pub fn is_known_type(typ: &str) -> bool {
    let lower = typ.trim().to_ascii_lowercase();
    let base = lower.trim_end_matches("[]");
    let base = base.split('(').next().unwrap_or_default();
    let base = base.trim().trim_end_matches(" unsigned").trim();
    KNOWN_TYPES.contains(&base)
}

pub fn parse(input: &str) -> ParseResult<Database> {
    let (lines, diagnostics) = Lexer::new(input).tokenize();
    let mut parser = Parser {
        diagnostics,
        ..Parser::default()
    };
    for line in &lines {
        parser.line(line);
    }
    parser.finish()
}

#[derive(Default)]
enum Block {
    #[default]
    Closed,
    /// Attributes of a rejected entity are dropped silently.
    Skipped,
    Entity {
        index: usize,
        parents: Vec<(usize, AttributePath)>,
    },
}

#[derive(Default)]
struct Parser {
    db: Database,
    namespace: Namespace,
    block: Block,
    relations: Vec<(Relation, Position)>,
    type_uses: Vec<(String, Position)>,
    diagnostics: Vec<Diagnostic>,
}

struct Endpoint {
    entity: EntityRef,
    attrs: Vec<AttributePath>,
}

struct Link {
    cardinality: (Cardinality, Cardinality),
    target: Endpoint,
    position: Position,
}

/// One attribute line, before it is attached to its entity.
struct AttributeLine {
    attribute: Attribute,
    type_position: Option<Position>,
    pk: Option<Option<String>>,
    indexes: Vec<(Option<String>, bool)>,
    checks: Vec<(Option<String>, String)>,
    links: Vec<Link>,
}

impl Parser {
    fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, position: Position) {
        self.diagnostics.push(Diagnostic::error(kind, message, position));
    }

    fn line(&mut self, line: &Line) {
        if line.is_blank() {
            self.block = Block::Closed;
            return;
        }
        if line.is_comment() {
            return;
        }

        if line.indent > 0 {
            let index = match &self.block {
                Block::Entity { index, .. } => *index,
                Block::Skipped => return,
                Block::Closed => {
                    self.error(
                        DiagnosticKind::InvalidSyntax,
                        "Attribute line outside of an entity block",
                        line.position(),
                    );
                    return;
                }
            };
            match attribute_line(line, &self.namespace) {
                Ok(parsed) => self.attribute(index, line.indent, parsed),
                Err(diagnostic) => self.diagnostics.push(diagnostic),
            }
            return;
        }

        self.block = Block::Closed;
        let Some(first) = line.tokens.first() else {
            self.error(DiagnosticKind::InvalidSyntax, "Expected an entity name", line.position());
            return;
        };
        if first.is("namespace") && line.tokens.len() <= 2 {
            self.namespace = match line.tokens.get(1) {
                Some(token) => {
                    let Ok(namespace) = token.text.parse::<Namespace>();
                    namespace
                }
                None => Namespace::default(),
            };
            trace!(namespace = %self.namespace, "default namespace");
        } else if first.is("rel") && line.tokens.len() > 1 {
            self.relation_directive(line);
        } else if first.is("type") && line.tokens.len() > 1 {
            self.type_directive(line);
        } else {
            self.entity(line);
        }
    }

    fn entity(&mut self, line: &Line) {
        let id = entity_ref(&line.tokens[0].text, &self.namespace);
        for token in &line.tokens[1..] {
            self.error(
                DiagnosticKind::UnexpectedToken,
                format!("Unexpected '{}' after entity name", token.text),
                token.position,
            );
        }
        if self.db.entity(&id).is_some() {
            self.error(
                DiagnosticKind::DuplicateEntity,
                format!("Entity {} is already defined", id),
                line.tokens[0].position,
            );
            self.block = Block::Skipped;
            return;
        }

        let mut entity = Entity::new(id.namespace, id.entity);
        entity.doc = line.note.as_ref().map(|t| t.text.clone());
        entity.extra = comment_extra(line);
        self.db.entities.push(entity);
        self.block = Block::Entity {
            index: self.db.entities.len() - 1,
            parents: Vec::new(),
        };
    }

    fn attribute(&mut self, index: usize, indent: usize, line: AttributeLine) {
        let Block::Entity { parents, .. } = &mut self.block else {
            return;
        };
        while parents.last().is_some_and(|(level, _)| *level >= indent) {
            parents.pop();
        }
        let parent = parents.last().map(|(_, path)| path.clone());
        let path = match &parent {
            Some(parent) => parent.child(line.attribute.name.clone()),
            None => AttributePath::name(line.attribute.name.clone()),
        };
        parents.push((indent, path.clone()));

        if let Some(position) = line.type_position {
            self.type_uses.push((line.attribute.typ.clone(), position));
        }

        let entity = &mut self.db.entities[index];
        match parent.as_ref().and_then(|p| entity.attribute_mut(p)) {
            Some(parent) => parent.attrs.push(line.attribute),
            None => entity.attrs.push(line.attribute),
        }

        if let Some(name) = line.pk {
            let pk = entity.pk.get_or_insert_with(|| PrimaryKey {
                name: None,
                attrs: Vec::new(),
            });
            if name.is_some() {
                pk.name = name;
            }
            pk.attrs.push(path.clone());
        }

        for (name, unique) in line.indexes {
            let grouped = name.as_ref().and_then(|n| {
                entity
                    .indexes
                    .iter_mut()
                    .find(|i| i.unique == unique && i.name.as_ref() == Some(n))
            });
            match grouped {
                Some(index) => index.attrs.push(path.clone()),
                None => entity.indexes.push(Index {
                    name,
                    attrs: vec![path.clone()],
                    unique,
                    partial: None,
                    definition: None,
                    doc: None,
                }),
            }
        }

        for (name, predicate) in line.checks {
            let grouped = name
                .as_ref()
                .and_then(|n| entity.checks.iter_mut().find(|c| c.name.as_ref() == Some(n)));
            match grouped {
                Some(check) => check.attrs.push(path.clone()),
                None => entity.checks.push(Check {
                    name,
                    attrs: vec![path.clone()],
                    predicate,
                    doc: None,
                }),
            }
        }

        let src = entity.id();
        for link in line.links {
            let relation = Relation::new(
                RelationLink::new(src.clone(), vec![path.clone()], link.cardinality.0),
                RelationLink::new(link.target.entity, link.target.attrs, link.cardinality.1),
            );
            self.relations.push((relation, link.position));
        }
    }

    /// `rel <src>(<attrs>) <op> <ref>(<attrs>)`
    fn relation_directive(&mut self, line: &Line) {
        let [_, src, op, reference] = line.tokens.as_slice() else {
            self.error(
                DiagnosticKind::InvalidSyntax,
                "Expected `rel <entity>(<attrs>) -> <entity>(<attrs>)`",
                line.position(),
            );
            return;
        };
        let Some(cardinality) = link_cardinality(op) else {
            self.error(
                DiagnosticKind::UnexpectedToken,
                format!("Expected '->', '--' or '<>', found '{}'", op.text),
                op.position,
            );
            return;
        };
        let source = endpoint(&src.text, &self.namespace);
        if source.attrs.is_empty() {
            self.error(
                DiagnosticKind::InvalidSyntax,
                format!("Missing attributes for {}", source.entity),
                src.position,
            );
            return;
        }
        let target = endpoint(&reference.text, &self.namespace);
        let mut relation = Relation::new(
            RelationLink::new(source.entity, source.attrs, cardinality.0),
            RelationLink::new(target.entity, target.attrs, cardinality.1),
        );
        relation.doc = line.note.as_ref().map(|t| t.text.clone());
        relation.extra = comment_extra(line);
        self.relations.push((relation, line.position()));
    }

    /// `type <name> [(<values>) | `<definition>`]`
    fn type_directive(&mut self, line: &Line) {
        let Ok(mut id) = line.tokens[1].text.parse::<TypeRef>();
        if id.namespace.is_empty() {
            id.namespace = self.namespace.clone();
        }
        if self.db.types.iter().any(|t| t.id() == id) {
            self.error(
                DiagnosticKind::DuplicateEntity,
                format!("Type {} is already defined", id),
                line.tokens[1].position,
            );
            return;
        }

        let mut typ = Type {
            namespace: id.namespace,
            name: id.name,
            doc: line.note.as_ref().map(|t| t.text.clone()),
            extra: comment_extra(line),
            ..Type::default()
        };
        match line.tokens.get(2) {
            None => {}
            Some(token) => match token.text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
                Some(values) => {
                    typ.values = Some(
                        split_unquoted(values, ',')
                            .into_iter()
                            .map(str::trim)
                            .filter(|v| !v.is_empty())
                            .map(unquote)
                            .collect(),
                    )
                }
                None => typ.definition = Some(unbacktick(&token.text).to_string()),
            },
        }
        for token in line.tokens.iter().skip(3) {
            self.error(
                DiagnosticKind::UnexpectedToken,
                format!("Unexpected '{}' after type definition", token.text),
                token.position,
            );
        }
        self.db.types.push(typ);
    }

    fn finish(mut self) -> ParseResult<Database> {
        let declared: HashSet<String> = self
            .db
            .types
            .iter()
            .flat_map(|t| [t.name.clone(), t.id().to_string()])
            .collect();
        for (typ, position) in mem::take(&mut self.type_uses) {
            if !is_known_type(&typ) && !declared.contains(&typ) {
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::UnknownType,
                    format!("Unknown type '{}', kept as is", typ),
                    position,
                ));
            }
        }

        for (mut relation, position) in mem::take(&mut self.relations) {
            if self.db.entity(&relation.src.entity).is_none() {
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::UnknownEntity,
                    format!("Relation from unknown entity {}", relation.src.entity),
                    position,
                ));
            }
            let target_pk = match self.db.entity(&relation.reference.entity) {
                Some(target) => target.pk.as_ref().map(|pk| pk.attrs.clone()),
                None => {
                    self.diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::UnknownEntity,
                        format!("Relation to unknown entity {}", relation.reference.entity),
                        position,
                    ));
                    None
                }
            };
            if relation.reference.attrs.is_empty() {
                relation.reference.attrs = target_pk.unwrap_or_else(|| vec![AttributePath::name("id")]);
            }
            self.db.relations.push(relation);
        }

        self.diagnostics.sort_by_key(|d| d.position.offset.start);
        ParseResult::partial(self.db, self.diagnostics)
    }
}

/// `<name> [<type>[=<default>]] [modifiers…]`, note and comment already split
/// off by the lexer.
fn attribute_line(line: &Line, namespace: &Namespace) -> Result<AttributeLine, Diagnostic> {
    let mut tokens = line.tokens.iter().peekable();
    let Some(name) = tokens.next() else {
        return Err(Diagnostic::error(
            DiagnosticKind::InvalidSyntax,
            "Expected an attribute name",
            line.position(),
        ));
    };

    let mut attribute = Attribute::new(unquote(&name.text), "unknown");
    attribute.doc = line.note.as_ref().map(|t| t.text.clone());
    attribute.extra = comment_extra(line);
    let mut parsed = AttributeLine {
        attribute,
        type_position: None,
        pk: None,
        indexes: Vec::new(),
        checks: Vec::new(),
        links: Vec::new(),
    };

    if let Some(typ) = tokens.next_if(|t| modifier(t).is_none()) {
        let (typ_text, default) = split_default(&typ.text);
        parsed.attribute.typ = unquote(typ_text);
        parsed.attribute.default = default.map(|d| unbacktick(d).to_string());
        parsed.type_position = Some(typ.position);
    }

    while let Some(token) = tokens.next() {
        let Some((keyword, rest)) = modifier(token) else {
            return Err(Diagnostic::error(
                DiagnosticKind::UnexpectedToken,
                format!("Unknown attribute modifier '{}'", token.text),
                token.position,
            ));
        };
        match keyword.as_str() {
            "pk" => parsed.pk = Some(modifier_name(rest)),
            "nullable" => parsed.attribute.null = true,
            "generated" => parsed.attribute.generated = true,
            "unique" => parsed.indexes.push((modifier_name(rest), true)),
            "index" => parsed.indexes.push((modifier_name(rest), false)),
            "check" => {
                let (name, predicate) = match rest.find('(') {
                    Some(open) => (&rest[..open], &rest[open..]),
                    None => (rest, ""),
                };
                let predicate = predicate
                    .strip_prefix('(')
                    .and_then(|p| p.strip_suffix(')'))
                    .map(unbacktick)
                    .unwrap_or_default();
                parsed.checks.push((modifier_name(name), predicate.to_string()));
            }
            _ => {
                let Some(cardinality) = link_cardinality(token) else {
                    continue;
                };
                let Some(target) = tokens.next() else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidSyntax,
                        format!("Expected a referenced entity after '{}'", token.text),
                        token.position,
                    ));
                };
                parsed.links.push(Link {
                    cardinality,
                    target: endpoint(&target.text, namespace),
                    position: target.position,
                });
            }
        }
    }
    Ok(parsed)
}

/// Lowercase modifier keyword and the text after it, or `None` when the
/// token is not a modifier.
fn modifier(token: &Token) -> Option<(String, &str)> {
    let end = token.text.find(['=', '(']).unwrap_or(token.text.len());
    let keyword = token.text[..end].to_ascii_lowercase();
    match keyword.as_str() {
        "pk" | "nullable" | "unique" | "index" | "check" | "generated" => Some((keyword, &token.text[end..])),
        "->" | "--" | "<>" | "fk" if end == token.text.len() => Some((keyword, "")),
        _ => None,
    }
}

fn modifier_name(rest: &str) -> Option<String> {
    rest.strip_prefix('=')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(unquote)
}

fn link_cardinality(token: &Token) -> Option<(Cardinality, Cardinality)> {
    match token.text.to_ascii_lowercase().as_str() {
        "->" | "fk" => Some((Cardinality::Many, Cardinality::One)),
        "--" => Some((Cardinality::One, Cardinality::One)),
        "<>" => Some((Cardinality::Many, Cardinality::Many)),
        _ => None,
    }
}

/// `entity(a, b.c)` or a bare `entity`.
fn endpoint(text: &str, namespace: &Namespace) -> Endpoint {
    let split = text
        .strip_suffix(')')
        .and_then(|t| t.rfind('(').map(|open| (&t[..open], &t[open + 1..])));
    match split {
        Some((entity, attrs)) => Endpoint {
            entity: entity_ref(entity, namespace),
            attrs: split_unquoted(attrs, ',')
                .into_iter()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(|a| AttributePath::new(split_unquoted(a, '.').into_iter().map(unquote).collect()))
                .collect(),
        },
        None => Endpoint {
            entity: entity_ref(text, namespace),
            attrs: Vec::new(),
        },
    }
}

fn entity_ref(text: &str, namespace: &Namespace) -> EntityRef {
    let Ok(mut entity) = text.parse::<EntityRef>();
    if entity.namespace.is_empty() {
        entity.namespace = namespace.clone();
    }
    entity
}

/// Splits `type=default` on the first `=` outside quotes and parentheses.
fn split_default(text: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut quote = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '`' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, '=') if depth == 0 => return (&text[..i], Some(&text[i + 1..])),
            _ => {}
        }
    }
    (text, None)
}

fn unquote(text: &str) -> String {
    match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => text.to_string(),
    }
}

fn unbacktick(text: &str) -> &str {
    text.strip_prefix('`').and_then(|t| t.strip_suffix('`')).unwrap_or(text)
}

fn comment_extra(line: &Line) -> Extra {
    line.comment
        .iter()
        .map(|c| ("comment".to_string(), serde_json::Value::String(c.text.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Level;

    fn parse_ok(input: &str) -> Database {
        let result = parse(input);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        result.into_value().unwrap()
    }

    #[test]
    fn test_entity_with_pk() {
        let db = parse_ok("users | app users\n  id uuid pk\n  name varchar(255)\n");
        assert_eq!(db.entities.len(), 1);
        let users = &db.entities[0];
        assert_eq!(users.name, "users");
        assert_eq!(users.doc.as_deref(), Some("app users"));
        let attrs: Vec<_> = users.attrs.iter().map(|a| (a.name.as_str(), a.typ.as_str())).collect();
        assert_eq!(attrs, vec![("id", "uuid"), ("name", "varchar(255)")]);
        assert_eq!(users.pk.as_ref().unwrap().attrs, vec![AttributePath::name("id")]);
        assert!(!users.attrs[1].null);
    }

    #[test]
    fn test_modifiers() {
        let db = parse_ok(
            "posts\n  id int pk=posts_pk\n  slug varchar unique=slug_author index\n  author int unique=slug_author nullable\n  score int=0 check(`score >= 0`)\n  created timestamp=`now()`\n",
        );
        let posts = &db.entities[0];
        assert_eq!(posts.pk.as_ref().unwrap().name.as_deref(), Some("posts_pk"));
        assert_eq!(posts.indexes.len(), 2);
        assert_eq!(posts.indexes[0].name.as_deref(), Some("slug_author"));
        assert_eq!(
            posts.indexes[0].attrs,
            vec![AttributePath::name("slug"), AttributePath::name("author")]
        );
        assert!(posts.indexes[0].unique);
        assert!(!posts.indexes[1].unique);
        assert!(posts.attrs[2].null);
        assert_eq!(posts.attrs[3].default.as_deref(), Some("0"));
        assert_eq!(posts.checks[0].predicate, "score >= 0");
        assert_eq!(posts.attrs[4].default.as_deref(), Some("now()"));
    }

    #[test]
    fn test_inline_relations_and_namespace() {
        let db = parse_ok(
            "namespace app\n\nusers\n  id int pk\n\nposts\n  id int pk\n  author int -> users(id)\n  editor int fk users\n  profile int -- public.profiles(id)\n",
        );
        assert_eq!(db.entities[0].namespace, Namespace::schema("app"));
        assert_eq!(db.relations.len(), 3);
        let author = &db.relations[0];
        assert_eq!(author.src.entity, EntityRef::new(Namespace::schema("app"), "posts"));
        assert_eq!(author.src.cardinality, Some(Cardinality::Many));
        assert_eq!(author.reference.entity, EntityRef::new(Namespace::schema("app"), "users"));
        assert_eq!(db.relations[1].reference.attrs, vec![AttributePath::name("id")]);
        assert_eq!(db.relations[2].src.cardinality, Some(Cardinality::One));
        assert_eq!(db.relations[2].reference.entity.namespace, Namespace::schema("public"));
    }

    #[test]
    fn test_nested_attributes() {
        let db = parse_ok("users\n  id int pk\n  details json\n    address json\n      city text index\n  name text\n");
        let users = &db.entities[0];
        assert_eq!(users.attrs.len(), 3);
        let city = AttributePath::from("details.address.city");
        assert_eq!(users.attribute(&city).unwrap().typ, "text");
        assert_eq!(users.indexes[0].attrs, vec![city]);
    }

    #[test]
    fn test_directives() {
        let result = parse(
            "type status (active, \"on hold\") | lifecycle\ntype money `numeric(10,2)`\n\nusers\n  id int pk\n  state status\n  balance money\n  other geography\n\nposts\n  id int\n  owner int\n\nrel posts(owner) <> users(id) | shared # many owners\n",
        );
        let db = result.value().unwrap();
        assert_eq!(db.types.len(), 2);
        assert_eq!(
            db.types[0].values,
            Some(vec!["active".to_string(), "on hold".to_string()])
        );
        assert_eq!(db.types[0].doc.as_deref(), Some("lifecycle"));
        assert_eq!(db.types[1].definition.as_deref(), Some("numeric(10,2)"));
        let relation = &db.relations[0];
        assert_eq!(relation.src.cardinality, Some(Cardinality::Many));
        assert_eq!(relation.reference.cardinality, Some(Cardinality::Many));
        assert_eq!(relation.doc.as_deref(), Some("shared"));
        assert_eq!(relation.extra["comment"], "many owners");

        let warnings: Vec<_> = result.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, DiagnosticKind::UnknownType);
        assert!(warnings[0].message.contains("geography"));
    }

    #[test]
    fn test_quoted_commas_in_lists() {
        let db = parse_ok(
            "type size (small, \"a,b\", \"say \"\"hi\"\"\")\n\nitems\n  \"x,y\" int pk\n  \"a.b\" int\n\nparts\n  id int\n\nrel parts(id) -> items(\"x,y\", \"a.b\")\n",
        );
        assert_eq!(
            db.types[0].values,
            Some(vec!["small".to_string(), "a,b".to_string(), "say \"hi\"".to_string()])
        );
        assert_eq!(
            db.relations[0].reference.attrs,
            vec![AttributePath::name("x,y"), AttributePath::name("a.b")]
        );
    }

    #[test]
    fn test_generated_modifier() {
        let db = parse_ok("totals\n  id int pk\n  sum int=`a + b` generated\n  plain int=0\n");
        let totals = &db.entities[0];
        assert!(totals.attrs[1].generated);
        assert_eq!(totals.attrs[1].default.as_deref(), Some("a + b"));
        assert!(!totals.attrs[2].generated);
    }

    #[test]
    fn test_bad_line_is_skipped() {
        let result = parse("users\n  id int pk\n  name text frobnicate\n  email text\n");
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::UnexpectedToken);
        assert_eq!(errors[0].position.start.line, 3);
        let names: Vec<_> = result.value().unwrap().entities[0]
            .attrs
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "email"]);
    }

    #[test]
    fn test_duplicate_entity_and_unknown_target() {
        let result = parse("users\n  id int\n\nusers\n  other int\n\nposts\n  user_id int -> people(id)\n");
        let db = result.value().unwrap();
        assert_eq!(db.entities.len(), 2);
        assert_eq!(db.entities[0].attrs.len(), 1);
        let levels: Vec<_> = result.diagnostics.iter().map(|d| (d.level, d.kind)).collect();
        assert_eq!(
            levels,
            vec![
                (Level::Error, DiagnosticKind::DuplicateEntity),
                (Level::Warning, DiagnosticKind::UnknownEntity),
            ]
        );
        assert_eq!(db.relations.len(), 1);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let db = parse_ok("Users\n  id int PK\n  name text NULLABLE Unique\n");
        let users = &db.entities[0];
        assert!(users.pk.is_some());
        assert!(users.attrs[1].null);
        assert!(users.indexes[0].unique);
    }

    #[test]
    fn test_known_types() {
        assert!(is_known_type("VARCHAR(12)"));
        assert!(is_known_type("int[]"));
        assert!(is_known_type("timestamp with time zone"));
        assert!(is_known_type("int unsigned"));
        assert!(!is_known_type("geography"));
    }
}
