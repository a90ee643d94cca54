use crate::id::AttributePath;
use crate::interchange::Group;
use crate::model::{Attribute, Cardinality, Database, Entity};
use std::collections::HashMap;

/// How many attributes a diagram shows per entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetailLevel {
    Tables,
    Pk,
    PkFk,
    #[default]
    All,
}

impl DetailLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "tables" => Some(Self::Tables),
            "pk" => Some(Self::Pk),
            "pk_fk" => Some(Self::PkFk),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Pk => "pk",
            Self::PkFk => "pk_fk",
            Self::All => "all",
        }
    }
}

/// Node/edge projection of a [`Database`], shared by the diagram writers.
#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Entity id, e.g. `app.users`.
    pub id: String,
    pub label: String,
    pub doc: Option<String>,
    pub columns: Vec<Column>,
    pub group: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Column {
    /// Dotted path for nested attributes.
    pub name: String,
    pub typ: String,
    pub null: bool,
    pub is_pk: bool,
    pub is_fk: bool,
    pub doc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub from_cardinality: Cardinality,
    pub to_cardinality: Cardinality,
    pub label: Option<String>,
}

impl Graph {
    pub fn from_database(db: &Database, detail: DetailLevel) -> Self {
        let groups: HashMap<String, String> = db
            .extra
            .get("groups")
            .and_then(|g| serde_json::from_value::<Vec<Group>>(g.clone()).ok())
            .unwrap_or_default()
            .into_iter()
            .flat_map(|Group { name, entities }| entities.into_iter().map(move |e| (e.to_string(), name.clone())))
            .collect();

        let nodes: Vec<Node> = db
            .entities
            .iter()
            .map(|entity| {
                let id = entity.id().to_string();
                let mut columns = Vec::new();
                for attribute in &entity.attrs {
                    flatten(db, entity, attribute, AttributePath::name(attribute.name.clone()), &mut columns);
                }
                columns.retain(|c| match detail {
                    DetailLevel::Tables => false,
                    DetailLevel::Pk => c.is_pk,
                    DetailLevel::PkFk => c.is_pk || c.is_fk,
                    DetailLevel::All => true,
                });
                Node {
                    group: groups.get(&id).cloned(),
                    label: id.clone(),
                    id,
                    doc: entity.doc.clone(),
                    columns,
                }
            })
            .collect();

        let edges = db
            .relations
            .iter()
            .filter(|r| db.entity(&r.src.entity).is_some() && db.entity(&r.reference.entity).is_some())
            .map(|r| Edge {
                from: r.src.entity.to_string(),
                to: r.reference.entity.to_string(),
                from_cardinality: r.src.cardinality.unwrap_or(Cardinality::Many),
                to_cardinality: r.reference.cardinality.unwrap_or(Cardinality::One),
                label: r.name.clone(),
            })
            .collect();

        Graph { nodes, edges }
    }

    /// Group names in first-seen order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for group in self.nodes.iter().filter_map(|n| n.group.as_deref()) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }
}

fn flatten(db: &Database, entity: &Entity, attribute: &Attribute, path: AttributePath, out: &mut Vec<Column>) {
    let is_fk = db
        .relations
        .iter()
        .any(|r| entity.is(&r.src.entity) && r.src.attrs.contains(&path));
    out.push(Column {
        name: path.to_string(),
        typ: attribute.typ.clone(),
        null: attribute.null,
        is_pk: entity.is_in_pk(&path),
        is_fk,
        doc: attribute.doc.clone(),
    });
    for nested in &attribute.attrs {
        flatten(db, entity, nested, path.child(nested.name.clone()), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        crate::aml::parse(
            "users\n  id int pk\n  name text\n  email text\n\nposts\n  id int pk\n  author int -> users(id)\n  title text\n",
        )
        .into_value()
        .unwrap()
    }

    #[test]
    fn test_all_detail() {
        let graph = Graph::from_database(&db(), DetailLevel::All);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].columns.len(), 3);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].from, "posts");
        assert_eq!(graph.edges[0].to, "users");
    }

    #[test]
    fn test_pk_detail() {
        let graph = Graph::from_database(&db(), DetailLevel::Pk);
        assert_eq!(graph.nodes[0].columns.len(), 1);
        assert_eq!(graph.nodes[0].columns[0].name, "id");
    }

    #[test]
    fn test_pk_fk_detail() {
        let graph = Graph::from_database(&db(), DetailLevel::PkFk);
        let names: Vec<_> = graph.nodes[1].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "author"]);
    }

    #[test]
    fn test_tables_detail() {
        let graph = Graph::from_database(&db(), DetailLevel::Tables);
        assert!(graph.nodes.iter().all(|n| n.columns.is_empty()));
    }

    #[test]
    fn test_nested_columns_and_groups() {
        let mut db = crate::aml::parse("users\n  id int pk\n  details json\n    city text\n")
            .into_value()
            .unwrap();
        db.extra.insert(
            "groups".to_string(),
            serde_json::json!([{"name": "core", "entities": [{"entity": "users"}]}]),
        );
        let graph = Graph::from_database(&db, DetailLevel::All);
        let names: Vec<_> = graph.nodes[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "details", "details.city"]);
        assert_eq!(graph.nodes[0].group.as_deref(), Some("core"));
        assert_eq!(graph.groups(), vec!["core"]);
    }
}
