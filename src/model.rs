//! Canonical schema model shared by every dialect.
//!
//! Parsers build a [`Database`], generators and the diff engine read it. The
//! serde encoding of these types is the interchange-JSON dialect.

use crate::diagnostic::{Diagnostic, DiagnosticKind, Position};
use crate::id::{AttributePath, EntityRef, Namespace, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Free-form metadata attached to model nodes.
pub type Extra = BTreeMap<String, serde_json::Value>;

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<Type>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DatabaseStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Dialect or tool the schema was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(flatten)]
    pub namespace: Namespace,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk: Option<PrimaryKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<Check>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: Extra,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub null: bool,
    #[serde(default, rename = "gen", skip_serializing_if = "is_false")]
    pub generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub attrs: Vec<AttributePath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub attrs: Vec<AttributePath>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl Index {
    /// Identity inside its entity: the name, or the attribute list when unnamed.
    pub fn key(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .attrs
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<AttributePath>,
    pub predicate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationLink {
    #[serde(flatten)]
    pub entity: EntityRef,
    pub attrs: Vec<AttributePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
}

impl RelationLink {
    pub fn new(entity: EntityRef, attrs: Vec<AttributePath>, cardinality: Cardinality) -> Self {
        Self {
            entity,
            attrs,
            cardinality: Some(cardinality),
        }
    }
}

/// A directional link `src -> ref`, typically a foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub src: RelationLink,
    #[serde(rename = "ref")]
    pub reference: RelationLink,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl Relation {
    pub fn new(src: RelationLink, reference: RelationLink) -> Self {
        Self {
            name: None,
            src,
            reference,
            on_delete: None,
            on_update: None,
            doc: None,
            extra: Extra::new(),
        }
    }

    /// Many rows of `src` point to one row of `reference`.
    pub fn many_to_one(
        src: EntityRef,
        src_attrs: Vec<AttributePath>,
        reference: EntityRef,
        ref_attrs: Vec<AttributePath>,
    ) -> Self {
        Self::new(
            RelationLink::new(src, src_attrs, Cardinality::Many),
            RelationLink::new(reference, ref_attrs, Cardinality::One),
        )
    }

    pub fn key(&self) -> (&EntityRef, &[AttributePath], &EntityRef, &[AttributePath]) {
        (
            &self.src.entity,
            &self.src.attrs,
            &self.reference.entity,
            &self.reference.attrs,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Type {
    #[serde(flatten)]
    pub namespace: Namespace,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl Type {
    pub fn id(&self) -> TypeRef {
        TypeRef::new(self.namespace.clone(), self.name.clone())
    }
}

impl Attribute {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ: typ.into(),
            ..Self::default()
        }
    }
}

impl Entity {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> EntityRef {
        EntityRef::new(self.namespace.clone(), self.name.clone())
    }

    pub fn is(&self, entity: &EntityRef) -> bool {
        self.namespace == entity.namespace && self.name == entity.entity
    }

    /// Resolves a path through nested attributes.
    pub fn attribute(&self, path: &AttributePath) -> Option<&Attribute> {
        let (head, rest) = path.names().split_first()?;
        let mut attr = self.attrs.iter().find(|a| &a.name == head)?;
        for name in rest {
            attr = attr.attrs.iter().find(|a| &a.name == name)?;
        }
        Some(attr)
    }

    pub fn attribute_mut(&mut self, path: &AttributePath) -> Option<&mut Attribute> {
        let (head, rest) = path.names().split_first()?;
        let mut attr = self.attrs.iter_mut().find(|a| &a.name == head)?;
        for name in rest {
            attr = attr.attrs.iter_mut().find(|a| &a.name == name)?;
        }
        Some(attr)
    }

    pub fn has_attribute(&self, path: &AttributePath) -> bool {
        self.attribute(path).is_some()
    }

    /// True when `path` is the single-column primary key.
    pub fn is_single_pk(&self, path: &AttributePath) -> bool {
        self.pk.as_ref().is_some_and(|pk| pk.attrs.len() == 1 && &pk.attrs[0] == path)
    }

    pub fn is_in_pk(&self, path: &AttributePath) -> bool {
        self.pk.as_ref().is_some_and(|pk| pk.attrs.contains(path))
    }
}

impl Database {
    pub fn entity(&self, id: &EntityRef) -> Option<&Entity> {
        self.entities.iter().find(|e| e.is(id))
    }

    pub fn entity_mut(&mut self, id: &EntityRef) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.is(id))
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty() && self.types.is_empty()
    }

    /// Checks identity and reference invariants. Duplicate entities are
    /// errors, unresolved references are warnings.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut seen = HashSet::new();

        for entity in &self.entities {
            let id = entity.id();
            if !seen.insert(id.clone()) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::DuplicateEntity,
                    format!("Entity {} is defined more than once", id),
                    Position::default(),
                ));
            }

            let paths = entity
                .pk
                .iter()
                .flat_map(|pk| pk.attrs.iter())
                .chain(entity.indexes.iter().flat_map(|i| i.attrs.iter()))
                .chain(entity.checks.iter().flat_map(|c| c.attrs.iter()));
            for path in paths {
                if !entity.has_attribute(path) {
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::UnknownAttribute,
                        format!("Attribute {} not found in {}", path, id),
                        Position::default(),
                    ));
                }
            }
        }

        for relation in &self.relations {
            for link in [&relation.src, &relation.reference] {
                match self.entity(&link.entity) {
                    None => diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::UnknownEntity,
                        format!("Relation references unknown entity {}", link.entity),
                        Position::default(),
                    )),
                    Some(entity) => {
                        for path in &link.attrs {
                            if !entity.has_attribute(path) {
                                diagnostics.push(Diagnostic::warning(
                                    DiagnosticKind::UnknownAttribute,
                                    format!("Relation references unknown attribute {}({})", link.entity, path),
                                    Position::default(),
                                ));
                            }
                        }
                    }
                }
            }
        }

        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Level;

    fn users() -> Entity {
        let mut details = Attribute::new("details", "json");
        details.attrs = vec![Attribute::new("address", "json")];
        details.attrs[0].attrs = vec![Attribute::new("street", "varchar")];
        Entity {
            attrs: vec![Attribute::new("id", "uuid"), details],
            pk: Some(PrimaryKey {
                name: None,
                attrs: vec![AttributePath::name("id")],
            }),
            ..Entity::new(Namespace::schema("public"), "users")
        }
    }

    #[test]
    fn test_nested_attribute_lookup() {
        let entity = users();
        let street = entity.attribute(&AttributePath::from("details.address.street"));
        assert_eq!(street.map(|a| a.typ.as_str()), Some("varchar"));
        assert!(entity.attribute(&AttributePath::from("details.zip")).is_none());
        assert!(entity.is_single_pk(&AttributePath::name("id")));
    }

    #[test]
    fn test_validate_duplicates_and_dangling() {
        let db = Database {
            entities: vec![users(), users()],
            relations: vec![Relation::many_to_one(
                EntityRef::named("posts"),
                vec![AttributePath::name("author")],
                EntityRef::new(Namespace::schema("public"), "users"),
                vec![AttributePath::name("uid")],
            )],
            ..Database::default()
        };
        let diagnostics = db.validate();
        let kinds: Vec<_> = diagnostics.iter().map(|d| (d.level, d.kind)).collect();
        assert!(kinds.contains(&(Level::Error, DiagnosticKind::DuplicateEntity)));
        assert!(kinds.contains(&(Level::Warning, DiagnosticKind::UnknownEntity)));
        assert!(kinds.contains(&(Level::Warning, DiagnosticKind::UnknownAttribute)));
    }

    #[test]
    fn test_json_shape() {
        let db = Database {
            entities: vec![users()],
            ..Database::default()
        };
        let json = serde_json::to_value(&db).unwrap();
        assert_eq!(json["entities"][0]["schema"], "public");
        assert_eq!(json["entities"][0]["name"], "users");
        assert_eq!(json["entities"][0]["attrs"][0]["type"], "uuid");
        assert!(json["entities"][0]["attrs"][0].get("null").is_none());
        assert_eq!(json["entities"][0]["pk"]["attrs"][0][0], "id");
        let back: Database = serde_json::from_value(json).unwrap();
        assert_eq!(back, db);
    }
}
