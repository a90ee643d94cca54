//! Writes a [`Database`] back as AML text.

use crate::id::{quote, AttributePath};
use crate::model::{Attribute, Cardinality, Database, Entity, Extra, Relation, Type};
use std::collections::HashSet;

pub fn generate(db: &Database) -> String {
    let mut output = String::new();

    for typ in &db.types {
        serialize_type(&mut output, typ);
    }

    let inline: HashSet<usize> = db
        .relations
        .iter()
        .enumerate()
        .filter(|(_, relation)| is_inline(db, relation))
        .map(|(i, _)| i)
        .collect();

    for entity in &db.entities {
        if !output.is_empty() {
            output.push('\n');
        }
        let relations: Vec<&Relation> = db
            .relations
            .iter()
            .enumerate()
            .filter(|(i, r)| inline.contains(i) && entity.is(&r.src.entity))
            .map(|(_, r)| r)
            .collect();
        serialize_entity(&mut output, entity, &relations);
    }

    let standalone: Vec<&Relation> = db
        .relations
        .iter()
        .enumerate()
        .filter(|(i, _)| !inline.contains(i))
        .map(|(_, r)| r)
        .collect();
    if !standalone.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        for relation in standalone {
            serialize_relation(&mut output, relation);
        }
    }

    output
}

/// A relation is written on its attribute line when it starts from exactly
/// one existing attribute and carries no doc or extra.
fn is_inline(db: &Database, relation: &Relation) -> bool {
    relation.src.attrs.len() == 1
        && relation.doc.is_none()
        && relation.extra.is_empty()
        && db
            .entity(&relation.src.entity)
            .is_some_and(|e| e.has_attribute(&relation.src.attrs[0]))
}

fn serialize_type(output: &mut String, typ: &Type) {
    output.push_str(&format!("type {}", typ.id()));
    if let Some(values) = &typ.values {
        let values: Vec<String> = values.iter().map(|v| quote(v)).collect();
        output.push_str(&format!(" ({})", values.join(", ")));
    } else if let Some(definition) = &typ.definition {
        output.push_str(&format!(" `{}`", definition));
    }
    serialize_trailer(output, typ.doc.as_deref(), &typ.extra);
}

fn serialize_entity(output: &mut String, entity: &Entity, relations: &[&Relation]) {
    output.push_str(&entity.id().to_string());
    serialize_trailer(output, entity.doc.as_deref(), &entity.extra);
    for attribute in &entity.attrs {
        serialize_attribute(output, entity, relations, attribute, AttributePath::name(attribute.name.clone()));
    }
}

fn serialize_attribute(
    output: &mut String,
    entity: &Entity,
    relations: &[&Relation],
    attribute: &Attribute,
    path: AttributePath,
) {
    let depth = path.names().len();
    output.push_str(&"  ".repeat(depth));
    output.push_str(&quote(&attribute.name));
    output.push(' ');
    output.push_str(&serialize_type_name(&attribute.typ));
    if let Some(default) = &attribute.default {
        if is_simple_default(default) {
            output.push_str(&format!("={}", default));
        } else {
            output.push_str(&format!("=`{}`", default));
        }
    }

    if let Some(pk) = entity.pk.as_ref().filter(|pk| pk.attrs.contains(&path)) {
        match &pk.name {
            Some(name) => output.push_str(&format!(" pk={}", quote(name))),
            None => output.push_str(" pk"),
        }
    }
    if attribute.null {
        output.push_str(" nullable");
    }
    if attribute.generated {
        output.push_str(" generated");
    }
    for index in entity.indexes.iter().filter(|i| i.attrs.contains(&path)) {
        let keyword = if index.unique { "unique" } else { "index" };
        match group_name(entity, index.name.as_deref(), &index.attrs, keyword) {
            Some(name) => output.push_str(&format!(" {}={}", keyword, quote(&name))),
            None => output.push_str(&format!(" {}", keyword)),
        }
    }
    for check in entity.checks.iter().filter(|c| c.attrs.contains(&path)) {
        output.push_str(" check");
        if let Some(name) = group_name(entity, check.name.as_deref(), &check.attrs, "check") {
            output.push_str(&format!("={}", quote(&name)));
        }
        if !check.predicate.is_empty() {
            output.push_str(&format!("(`{}`)", check.predicate));
        }
    }
    for relation in relations.iter().filter(|r| r.src.attrs[0] == path) {
        output.push_str(&format!(" {} {}", operator(relation), endpoint(relation)));
    }
    serialize_trailer(output, attribute.doc.as_deref(), &attribute.extra);

    for nested in &attribute.attrs {
        serialize_attribute(output, entity, relations, nested, path.child(nested.name.clone()));
    }
}

/// Composite constraints need a shared name so the parser groups them back.
fn group_name(entity: &Entity, name: Option<&str>, attrs: &[AttributePath], suffix: &str) -> Option<String> {
    match name {
        Some(name) => Some(name.to_string()),
        None if attrs.len() > 1 => {
            let columns: Vec<String> = attrs.iter().map(|a| a.names().join("_")).collect();
            Some(format!("{}_{}_{}", entity.name, columns.join("_"), suffix))
        }
        None => None,
    }
}

fn serialize_relation(output: &mut String, relation: &Relation) {
    output.push_str(&format!(
        "rel {}({}) {} {}",
        relation.src.entity,
        paths(&relation.src.attrs),
        operator(relation),
        endpoint(relation)
    ));
    serialize_trailer(output, relation.doc.as_deref(), &relation.extra);
}

fn endpoint(relation: &Relation) -> String {
    format!("{}({})", relation.reference.entity, paths(&relation.reference.attrs))
}

fn paths(attrs: &[AttributePath]) -> String {
    attrs
        .iter()
        .map(|a| {
            a.names()
                .iter()
                .map(|n| quote(n))
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn operator(relation: &Relation) -> &'static str {
    match (relation.src.cardinality, relation.reference.cardinality) {
        (Some(Cardinality::One), Some(Cardinality::One)) => "--",
        (Some(Cardinality::Many), Some(Cardinality::Many)) => "<>",
        _ => "->",
    }
}

/// `| doc # comment` and the line break.
fn serialize_trailer(output: &mut String, doc: Option<&str>, extra: &Extra) {
    if let Some(doc) = doc {
        output.push_str(&format!(" | {}", doc));
    }
    if let Some(comment) = extra.get("comment").and_then(|c| c.as_str()) {
        output.push_str(&format!(" # {}", comment));
    }
    output.push('\n');
}

fn serialize_type_name(typ: &str) -> String {
    if typ.chars().any(|c| c.is_whitespace() || matches!(c, '=' | '#' | '|' | '"')) {
        format!("\"{}\"", typ.replace('"', "\"\""))
    } else {
        typ.to_string()
    }
}

fn is_simple_default(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+' | ':' | '\''))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aml::parser::parse;
    use crate::id::{EntityRef, Namespace};
    use crate::model::{Index, PrimaryKey};

    #[test]
    fn test_serialize_simple_entity() {
        let mut users = Entity::new(Namespace::default(), "users");
        users.attrs = vec![Attribute::new("id", "uuid"), Attribute::new("email", "varchar(255)")];
        users.attrs[1].null = true;
        users.pk = Some(PrimaryKey {
            name: None,
            attrs: vec![AttributePath::name("id")],
        });
        users.indexes.push(Index {
            name: None,
            attrs: vec![AttributePath::name("email")],
            unique: true,
            partial: None,
            definition: None,
            doc: None,
        });
        let db = Database {
            entities: vec![users],
            ..Database::default()
        };

        assert_eq!(generate(&db), "users\n  id uuid pk\n  email varchar(255) nullable unique\n");
    }

    #[test]
    fn test_serialize_relations() {
        let db = parse(
            "users\n  id int pk\n\nposts\n  id int pk\n  author int -> users(id)\n\nrel posts(id) -- users(id) | same id\n",
        )
        .into_value()
        .unwrap();
        let output = generate(&db);
        assert!(output.contains("  author int -> users(id)\n"));
        assert!(output.contains("rel posts(id) -- users(id) | same id\n"));
    }

    #[test]
    fn test_serialize_type_and_defaults() {
        let db = parse(
            "type status (active, \"on hold\")\n\norders\n  state status=active\n  created \"timestamp with time zone\"=`now()`\n",
        )
        .into_value()
        .unwrap();
        let output = generate(&db);
        assert!(output.starts_with("type status (active, \"on hold\")\n\norders\n"));
        assert!(output.contains("  state status=active\n"));
        assert!(output.contains("  created \"timestamp with time zone\"=`now()`\n"));
    }

    #[test]
    fn test_composite_index_gets_a_name() {
        let db = parse("likes\n  user_id int unique\n  post_id int\n").into_value().unwrap();
        let mut db = db;
        db.entities[0].indexes[0].attrs.push(AttributePath::name("post_id"));
        let output = generate(&db);
        assert!(output.contains("  user_id int unique=likes_user_id_post_id_unique\n"));
        assert!(output.contains("  post_id int unique=likes_user_id_post_id_unique\n"));
    }

    #[test]
    fn test_serialize_generated_column() {
        let db = parse("totals\n  id int pk\n  sum int=`a + b` generated\n").into_value().unwrap();
        let output = generate(&db);
        assert!(output.contains("  sum int=`a + b` generated\n"));
        assert_eq!(parse(&output).into_value().unwrap(), db);
    }

    #[test]
    fn test_enum_values_with_commas_round_trip() {
        let mut db = Database::default();
        db.types.push(Type {
            name: "size".to_string(),
            values: Some(vec!["small".to_string(), "a,b".to_string()]),
            ..Type::default()
        });
        let output = generate(&db);
        assert_eq!(output, "type size (small, \"a,b\")\n");
        assert_eq!(parse(&output).into_value().unwrap(), db);
    }

    #[test]
    fn test_round_trip() {
        let input = "namespace app\n\nusers | people # main table\n  id uuid pk\n  details json\n    city text index\n  score int=0 check(`score >= 0`)\n\nposts\n  id uuid pk\n  author uuid -> users(id)\n";
        let first = parse(input).into_value().unwrap();
        let text = generate(&first);
        let second = parse(&text).into_value().unwrap();
        assert_eq!(first, second);
        assert_eq!(generate(&second), text);
        assert_eq!(second.entities[0].id(), EntityRef::new(Namespace::schema("app"), "users"));
    }
}
