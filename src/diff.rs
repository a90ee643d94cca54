//! Structural diff of two schema snapshots.
//!
//! Items are matched by identity, never by position: entities and types by
//! namespace and name, relations by both endpoints, attributes by name and
//! indexes by [`Index::key`]. Every bucket is ordered by that key and items
//! that are equal on both sides are left out.

use crate::id::{AttributePath, EntityRef};
use crate::model::{Attribute, Database, Entity, Index, PrimaryKey, Relation, Type};
use serde::Serialize;
use std::collections::BTreeMap;

/// Exchanges the left and right side of a diff.
pub trait Swap {
    fn swapped(self) -> Self;
}

/// Both versions of an item whose identity matched but content did not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Changed<T> {
    pub left: T,
    pub right: T,
}

impl<T> Swap for Changed<T> {
    fn swapped(self) -> Self {
        Changed {
            left: self.right,
            right: self.left,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionDiff<T, D> {
    /// Only in the left snapshot.
    pub left: Vec<T>,
    /// Only in the right snapshot.
    pub right: Vec<T>,
    /// In both, with different content.
    pub both: Vec<D>,
}

impl<T, D> CollectionDiff<T, D> {
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty() && self.both.is_empty()
    }
}

impl<T, D: Swap> Swap for CollectionDiff<T, D> {
    fn swapped(self) -> Self {
        CollectionDiff {
            left: self.right,
            right: self.left,
            both: self.both.into_iter().map(Swap::swapped).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDiff {
    pub id: EntityRef,
    pub left: Entity,
    pub right: Entity,
    pub attributes: CollectionDiff<Attribute, Changed<Attribute>>,
    pub indexes: CollectionDiff<Index, Changed<Index>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pk: Option<Changed<Option<PrimaryKey>>>,
}

impl EntityDiff {
    fn new(left: &Entity, right: &Entity) -> Self {
        EntityDiff {
            id: left.id(),
            attributes: diff_collection(&left.attrs, &right.attrs, |a| a.name.clone()),
            indexes: diff_collection(&left.indexes, &right.indexes, Index::key),
            pk: (left.pk != right.pk).then(|| Changed {
                left: left.pk.clone(),
                right: right.pk.clone(),
            }),
            left: left.clone(),
            right: right.clone(),
        }
    }
}

impl Swap for EntityDiff {
    fn swapped(self) -> Self {
        EntityDiff {
            id: self.id,
            left: self.right,
            right: self.left,
            attributes: self.attributes.swapped(),
            indexes: self.indexes.swapped(),
            pk: self.pk.map(Swap::swapped),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseDiff {
    pub entities: CollectionDiff<Entity, EntityDiff>,
    pub relations: CollectionDiff<Relation, Changed<Relation>>,
    pub types: CollectionDiff<Type, Changed<Type>>,
}

impl DatabaseDiff {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty() && self.types.is_empty()
    }
}

impl Swap for DatabaseDiff {
    fn swapped(self) -> Self {
        DatabaseDiff {
            entities: self.entities.swapped(),
            relations: self.relations.swapped(),
            types: self.types.swapped(),
        }
    }
}

type RelationKey = (EntityRef, Vec<AttributePath>, EntityRef, Vec<AttributePath>);

fn relation_key(relation: &Relation) -> RelationKey {
    let (src, src_attrs, reference, ref_attrs) = relation.key();
    (src.clone(), src_attrs.to_vec(), reference.clone(), ref_attrs.to_vec())
}

pub fn diff(left: &Database, right: &Database) -> DatabaseDiff {
    DatabaseDiff {
        entities: diff_by(&left.entities, &right.entities, Entity::id, EntityDiff::new),
        relations: diff_collection(&left.relations, &right.relations, relation_key),
        types: diff_collection(&left.types, &right.types, Type::id),
    }
}

fn diff_collection<T, K>(left: &[T], right: &[T], key: impl Fn(&T) -> K) -> CollectionDiff<T, Changed<T>>
where
    T: Clone + PartialEq,
    K: Ord,
{
    diff_by(left, right, key, |l, r| Changed {
        left: l.clone(),
        right: r.clone(),
    })
}

/// One pass per side into a keyed lookup, then every key is classified. On
/// duplicate keys the first item wins.
fn diff_by<T, K, D>(
    left: &[T],
    right: &[T],
    key: impl Fn(&T) -> K,
    changed: impl Fn(&T, &T) -> D,
) -> CollectionDiff<T, D>
where
    T: Clone + PartialEq,
    K: Ord,
{
    let left_map = keyed(left, &key);
    let mut right_map = keyed(right, &key);

    let mut diff = CollectionDiff {
        left: Vec::new(),
        right: Vec::new(),
        both: Vec::new(),
    };
    for (k, l) in left_map {
        match right_map.remove(&k) {
            None => diff.left.push(l.clone()),
            Some(r) if l != r => diff.both.push(changed(l, r)),
            Some(_) => {}
        }
    }
    diff.right = right_map.into_values().cloned().collect();
    diff
}

fn keyed<'a, T, K: Ord>(items: &'a [T], key: &impl Fn(&T) -> K) -> BTreeMap<K, &'a T> {
    let mut map = BTreeMap::new();
    for item in items {
        map.entry(key(item)).or_insert(item);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aml;

    fn db(input: &str) -> Database {
        aml::parse(input).into_value().unwrap()
    }

    #[test]
    fn test_self_diff_is_empty() {
        let schema = db("users\n  id int pk\n\nposts\n  id int pk\n  author int -> users(id)\n");
        assert!(diff(&schema, &schema).is_empty());
    }

    #[test]
    fn test_entity_buckets() {
        let left = db("users\n  id int pk\n\nposts\n  id int pk\n");
        let right = db("comments\n  id int pk\n\nusers\n  id int pk\n");
        let result = diff(&left, &right);
        let names = |entities: &[Entity]| entities.iter().map(|e| e.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&result.entities.left), vec!["posts"]);
        assert_eq!(names(&result.entities.right), vec!["comments"]);
        assert!(result.entities.both.is_empty());
    }

    #[test]
    fn test_changed_entity() {
        let left = db("users\n  id int pk\n  name text\n  age int\n");
        let right = db("users\n  id uuid pk\n  age int\n  email text unique\n");
        let result = diff(&left, &right);
        assert_eq!(result.entities.both.len(), 1);
        let users = &result.entities.both[0];
        assert_eq!(users.id, EntityRef::named("users"));
        assert_eq!(users.attributes.left[0].name, "name");
        assert_eq!(users.attributes.right[0].name, "email");
        assert_eq!(users.attributes.both.len(), 1);
        assert_eq!(users.attributes.both[0].left.typ, "int");
        assert_eq!(users.attributes.both[0].right.typ, "uuid");
        assert_eq!(users.indexes.right.len(), 1);
        assert!(users.pk.is_none());
    }

    #[test]
    fn test_reordering_is_not_a_change() {
        let left = db("a\n  id int\n\nb\n  id int\n");
        let right = db("b\n  id int\n\na\n  id int\n");
        assert!(diff(&left, &right).is_empty());
    }

    #[test]
    fn test_relations_and_types() {
        let left = db("type mood (sad)\n\nusers\n  id int pk\n\nposts\n  author int -> users(id)\n");
        let right = db("type mood (sad, happy)\n\nusers\n  id int pk\n\nposts\n  author int -- users(id)\n");
        let result = diff(&left, &right);
        assert_eq!(result.types.both.len(), 1);
        assert_eq!(result.relations.both.len(), 1);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_swapped() {
        let left = db("users\n  id int pk\n\nposts\n  id int\n");
        let right = db("users\n  id uuid pk\n\ncomments\n  id int\n");
        assert_eq!(diff(&right, &left), diff(&left, &right).swapped());
    }
}
