//! Strategies for generated schemas shared by the property tests.

use proptest::prelude::*;
use schemerd::id::{AttributePath, EntityRef, Namespace};
use schemerd::model::{Attribute, Database, Entity, PrimaryKey, Relation, Type};

const TYPES: &[&str] = &["int", "bigint", "text", "uuid", "boolean", "timestamp"];

fn attribute() -> impl Strategy<Value = Attribute> {
    ("[a-z][a-z0-9_]{0,6}", proptest::sample::select(TYPES), any::<bool>()).prop_map(|(name, typ, null)| {
        let mut attr = Attribute::new(name, typ);
        attr.null = null;
        attr
    })
}

fn entity() -> impl Strategy<Value = Entity> {
    (
        proptest::option::of("[a-z]{1,4}"),
        "[a-z][a-z_]{0,6}",
        proptest::collection::vec(attribute(), 0..5),
        any::<bool>(),
    )
        .prop_map(|(schema, name, mut attrs, with_pk)| {
            let mut seen = Vec::new();
            attrs.retain(|a| {
                let fresh = !seen.contains(&a.name);
                seen.push(a.name.clone());
                fresh
            });
            let namespace = schema.map(Namespace::schema).unwrap_or_default();
            let mut entity = Entity::new(namespace, name);
            entity.pk = attrs.first().filter(|_| with_pk).map(|first| PrimaryKey {
                name: None,
                attrs: vec![AttributePath::name(first.name.clone())],
            });
            entity.attrs = attrs;
            entity
        })
}

pub fn database() -> impl Strategy<Value = Database> {
    (
        proptest::collection::vec(entity(), 0..6),
        proptest::collection::vec(("[a-z]{1,5}", proptest::collection::vec("[a-z]{1,4}", 1..4)), 0..3),
        proptest::collection::vec((0usize..6, 0usize..6), 0..4),
    )
        .prop_map(|(mut entities, types, links)| {
            let mut ids: Vec<EntityRef> = Vec::new();
            entities.retain(|e| {
                let fresh = !ids.contains(&e.id());
                ids.push(e.id());
                fresh
            });
            let relations = links
                .into_iter()
                .filter(|(src, reference)| *src < entities.len() && *reference < entities.len())
                .map(|(src, reference)| {
                    Relation::many_to_one(
                        entities[src].id(),
                        vec![AttributePath::name(format!("{}_id", entities[reference].name))],
                        entities[reference].id(),
                        vec![AttributePath::name("id")],
                    )
                })
                .collect();
            let mut names: Vec<String> = Vec::new();
            let types = types
                .into_iter()
                .filter(|(name, _)| {
                    let fresh = !names.contains(name);
                    names.push(name.clone());
                    fresh
                })
                .map(|(name, values)| Type {
                    name,
                    values: Some(values),
                    ..Type::default()
                })
                .collect();
            Database {
                entities,
                relations,
                types,
                ..Database::default()
            }
        })
}
