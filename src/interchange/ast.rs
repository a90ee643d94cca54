//! Relational-modeling AST interchange: schemas of tables and enums, plus
//! refs with `1`/`*` endpoints and table groups.
//!
//! Import is a structural translation into the model; the default `public`
//! schema maps to an empty namespace. Generation is the inverse.

use super::json::decode;
use crate::diagnostic::ParseResult;
use crate::error::GenerateError;
use crate::id::{AttributePath, EntityRef, Namespace};
use crate::model::{Attribute, Cardinality, Database, Entity, Index, PrimaryKey, Relation, RelationLink, Type};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub schemas: Vec<SchemaNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<RefNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_groups: Vec<TableGroupNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableNode {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldNode {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: FieldType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pk: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbdefault: Option<DefaultNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldType {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultKind {
    Number,
    String,
    Boolean,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultNode {
    #[serde(rename = "type")]
    pub kind: DefaultKind,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<IndexColumn>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pk: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Column,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumNode {
    pub name: String,
    pub values: Vec<EnumValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub endpoints: [EndpointNode; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    pub table_name: String,
    pub field_names: Vec<String>,
    /// `1` or `*`.
    pub relation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableGroupNode {
    pub name: String,
    pub tables: Vec<GroupTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    pub name: String,
}

/// Display grouping stored under `extra.groups`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub entities: Vec<EntityRef>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn namespace(schema: Option<&str>) -> Namespace {
    match schema {
        None | Some("") | Some(DEFAULT_SCHEMA) => Namespace::default(),
        Some(schema) => Namespace::schema(schema),
    }
}

fn schema_name(namespace: &Namespace) -> Option<String> {
    namespace.schema.clone().filter(|s| s != DEFAULT_SCHEMA)
}

pub fn parse(input: &str) -> ParseResult<Database> {
    decode::<Document>(input).and_then(|document| {
        let db = import(&document);
        let diagnostics = db.validate();
        ParseResult::partial(db, diagnostics)
    })
}

pub fn import(document: &Document) -> Database {
    let mut db = Database::default();

    for schema in &document.schemas {
        let ns = namespace(Some(&schema.name));
        for table in &schema.tables {
            db.entities.push(import_table(&ns, table));
        }
        for node in &schema.enums {
            db.types.push(Type {
                namespace: ns.clone(),
                name: node.name.clone(),
                values: Some(node.values.iter().map(|v| v.name.clone()).collect()),
                doc: node.note.clone(),
                ..Type::default()
            });
        }
    }

    for node in &document.refs {
        db.relations.push(import_ref(&db, node));
    }

    if !document.table_groups.is_empty() {
        let groups: Vec<Group> = document
            .table_groups
            .iter()
            .map(|group| Group {
                name: group.name.clone(),
                entities: group
                    .tables
                    .iter()
                    .map(|t| EntityRef::new(namespace(t.schema_name.as_deref()), t.name.clone()))
                    .collect(),
            })
            .collect();
        if let Ok(value) = serde_json::to_value(groups) {
            db.extra.insert("groups".to_string(), value);
        }
    }
    db
}

fn import_table(ns: &Namespace, table: &TableNode) -> Entity {
    let mut entity = Entity::new(ns.clone(), table.name.clone());
    entity.doc = table.note.clone();

    let mut pk = Vec::new();
    for field in &table.fields {
        let typ = match &field.typ.schema_name {
            Some(schema) if schema != DEFAULT_SCHEMA => format!("{}.{}", schema, field.typ.type_name),
            _ => field.typ.type_name.clone(),
        };
        let mut attribute = Attribute::new(field.name.clone(), typ);
        attribute.null = !field.not_null && !field.pk;
        attribute.doc = field.note.clone();
        attribute.default = field.dbdefault.as_ref().map(default_text);
        if field.increment {
            attribute.extra.insert("autoIncrement".to_string(), Value::Bool(true));
        }
        if field.pk {
            pk.push(AttributePath::name(field.name.clone()));
        }
        if field.unique {
            entity.indexes.push(Index {
                name: None,
                attrs: vec![AttributePath::name(field.name.clone())],
                unique: true,
                partial: None,
                definition: None,
                doc: None,
            });
        }
        entity.attrs.push(attribute);
    }
    if !pk.is_empty() {
        entity.pk = Some(PrimaryKey { name: None, attrs: pk });
    }

    for index in &table.indexes {
        let attrs: Vec<AttributePath> = index
            .columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Column)
            .map(|c| AttributePath::name(c.value.clone()))
            .collect();
        if index.pk {
            entity.pk = Some(PrimaryKey {
                name: index.name.clone(),
                attrs,
            });
            continue;
        }
        let expressions: Vec<&str> = index
            .columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Expression)
            .map(|c| c.value.as_str())
            .collect();
        entity.indexes.push(Index {
            name: index.name.clone(),
            attrs,
            unique: index.unique,
            partial: None,
            definition: (!expressions.is_empty()).then(|| expressions.join(", ")),
            doc: index.note.clone(),
        });
    }

    for attribute in &mut entity.attrs {
        if entity.pk.as_ref().is_some_and(|pk| pk.attrs.iter().any(|a| a.head() == attribute.name)) {
            attribute.null = false;
        }
    }
    entity
}

fn default_text(default: &DefaultNode) -> String {
    let raw = match &default.value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match default.kind {
        DefaultKind::String => format!("'{}'", raw.replace('\'', "''")),
        _ => raw,
    }
}

fn import_ref(db: &Database, node: &RefNode) -> Relation {
    let link = |endpoint: &EndpointNode| {
        let entity = EntityRef::new(namespace(endpoint.schema_name.as_deref()), endpoint.table_name.clone());
        let attrs: Vec<AttributePath> = endpoint
            .field_names
            .iter()
            .map(|f| AttributePath::name(f.clone()))
            .collect();
        let cardinality = if endpoint.relation == "1" {
            Cardinality::One
        } else {
            Cardinality::Many
        };
        RelationLink::new(entity, attrs, cardinality)
    };
    let [first, second] = &node.endpoints;
    let (first, second) = (link(first), link(second));

    // The `1` side is referenced. When both sides are `1`, the side holding
    // its table's primary key is.
    let first_is_ref = match (first.cardinality, second.cardinality) {
        (Some(Cardinality::One), Some(Cardinality::Many)) => true,
        (Some(Cardinality::One), Some(Cardinality::One)) => is_pk(db, &first) && !is_pk(db, &second),
        _ => false,
    };
    let (src, reference) = if first_is_ref { (second, first) } else { (first, second) };

    let mut relation = Relation::new(src, reference);
    relation.name = node.name.clone();
    relation.on_delete = node.on_delete.clone();
    relation.on_update = node.on_update.clone();
    relation
}

fn is_pk(db: &Database, link: &RelationLink) -> bool {
    db.entity(&link.entity)
        .and_then(|e| e.pk.as_ref())
        .is_some_and(|pk| pk.attrs == link.attrs)
}

pub fn generate(db: &Database) -> Result<String, GenerateError> {
    let document = export(db)?;
    let mut output = serde_json::to_string_pretty(&document)?;
    output.push('\n');
    Ok(output)
}

pub fn export(db: &Database) -> Result<Document, GenerateError> {
    let mut document = Document::default();

    for typ in &db.types {
        let Some(values) = &typ.values else {
            return Err(GenerateError::unsupported("ast", format!("structural type {}", typ.id())));
        };
        schema_node(&mut document, &typ.namespace).enums.push(EnumNode {
            name: typ.name.clone(),
            values: values
                .iter()
                .map(|v| EnumValue {
                    name: v.clone(),
                    note: None,
                })
                .collect(),
            note: typ.doc.clone(),
        });
    }

    for entity in &db.entities {
        let table = export_table(entity);
        schema_node(&mut document, &entity.namespace).tables.push(table);
    }

    for relation in &db.relations {
        let endpoint = |link: &RelationLink, default: Cardinality| EndpointNode {
            schema_name: schema_name(&link.entity.namespace),
            table_name: link.entity.entity.clone(),
            field_names: link.attrs.iter().map(|a| a.to_string()).collect(),
            relation: match link.cardinality.unwrap_or(default) {
                Cardinality::One => "1".to_string(),
                Cardinality::Many => "*".to_string(),
            },
        };
        document.refs.push(RefNode {
            name: relation.name.clone(),
            endpoints: [
                endpoint(&relation.src, Cardinality::Many),
                endpoint(&relation.reference, Cardinality::One),
            ],
            on_delete: relation.on_delete.clone(),
            on_update: relation.on_update.clone(),
        });
    }

    if let Some(groups) = db.extra.get("groups") {
        let groups: Vec<Group> = serde_json::from_value(groups.clone())?;
        document.table_groups = groups
            .into_iter()
            .map(|group| TableGroupNode {
                name: group.name,
                tables: group
                    .entities
                    .into_iter()
                    .map(|e| GroupTable {
                        schema_name: schema_name(&e.namespace),
                        name: e.entity,
                    })
                    .collect(),
            })
            .collect();
    }
    Ok(document)
}

fn schema_node<'a>(document: &'a mut Document, ns: &Namespace) -> &'a mut SchemaNode {
    let name = ns.schema.clone().unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
    let position = match document.schemas.iter().position(|s| s.name == name) {
        Some(position) => position,
        None => {
            document.schemas.push(SchemaNode {
                name,
                ..SchemaNode::default()
            });
            document.schemas.len() - 1
        }
    };
    &mut document.schemas[position]
}

fn export_table(entity: &Entity) -> TableNode {
    let single_pk = entity
        .pk
        .as_ref()
        .filter(|pk| pk.name.is_none() && pk.attrs.len() == 1)
        .map(|pk| pk.attrs[0].clone());
    let is_single_unique = |index: &Index, name: &str| {
        index.unique
            && index.name.is_none()
            && index.definition.is_none()
            && index.partial.is_none()
            && index.doc.is_none()
            && index.attrs.len() == 1
            && index.attrs[0].names() == [name]
    };

    // Nested attributes have no field form and are left out.
    let fields = entity
        .attrs
        .iter()
        .map(|attribute| FieldNode {
            name: attribute.name.clone(),
            typ: FieldType {
                type_name: attribute.typ.clone(),
                schema_name: None,
            },
            pk: single_pk.as_ref().is_some_and(|pk| pk.names() == [attribute.name.as_str()]),
            unique: entity.indexes.iter().any(|i| is_single_unique(i, &attribute.name)),
            not_null: !attribute.null,
            increment: attribute.extra.get("autoIncrement").and_then(Value::as_bool) == Some(true),
            dbdefault: attribute.default.as_deref().map(default_node),
            note: attribute.doc.clone(),
        })
        .collect();

    let mut indexes = Vec::new();
    if let Some(pk) = entity.pk.as_ref().filter(|_| single_pk.is_none()) {
        indexes.push(IndexNode {
            name: pk.name.clone(),
            columns: columns(&pk.attrs),
            pk: true,
            unique: false,
            note: None,
        });
    }
    for index in &entity.indexes {
        if index.attrs.len() == 1 && is_single_unique(index, index.attrs[0].head()) {
            continue;
        }
        let mut columns = columns(&index.attrs);
        columns.extend(index.definition.iter().map(|d| IndexColumn {
            kind: ColumnKind::Expression,
            value: d.clone(),
        }));
        indexes.push(IndexNode {
            name: index.name.clone(),
            columns,
            pk: false,
            unique: index.unique,
            note: index.doc.clone(),
        });
    }

    TableNode {
        name: entity.name.clone(),
        fields,
        indexes,
        note: entity.doc.clone(),
    }
}

fn columns(attrs: &[AttributePath]) -> Vec<IndexColumn> {
    attrs
        .iter()
        .map(|a| IndexColumn {
            kind: ColumnKind::Column,
            value: a.to_string(),
        })
        .collect()
}

fn default_node(value: &str) -> DefaultNode {
    if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        return DefaultNode {
            kind: DefaultKind::String,
            value: Value::String(inner.replace("''", "'")),
        };
    }
    if let Ok(number) = value.parse::<serde_json::Number>() {
        return DefaultNode {
            kind: DefaultKind::Number,
            value: Value::Number(number),
        };
    }
    match value {
        "true" | "false" => DefaultNode {
            kind: DefaultKind::Boolean,
            value: Value::Bool(value == "true"),
        },
        _ => DefaultNode {
            kind: DefaultKind::Expression,
            value: Value::String(value.to_string()),
        },
    }
}
