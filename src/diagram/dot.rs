//! Graphviz output: one record node per entity, a cluster per group.

use super::graph::{Column, DetailLevel, Graph, Node};
use crate::error::GenerateError;
use crate::model::{Cardinality, Database};
use std::fmt::Write;

pub fn generate(db: &Database, detail: DetailLevel) -> Result<String, GenerateError> {
    let graph = Graph::from_database(db, detail);
    let mut out = String::new();

    writeln!(out, "digraph schema {{")?;
    writeln!(out, "  rankdir=LR;")?;
    writeln!(out, "  node [shape=record, fontname=\"Helvetica\", fontsize=10];")?;
    writeln!(out, "  edge [fontname=\"Helvetica\", fontsize=9];")?;

    for (i, group) in graph.groups().into_iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "  subgraph cluster_{} {{", i)?;
        writeln!(out, "    label=\"{}\";", escape_string(group))?;
        for node in graph.nodes.iter().filter(|n| n.group.as_deref() == Some(group)) {
            write_node(&mut out, "    ", node)?;
        }
        writeln!(out, "  }}")?;
    }

    let ungrouped: Vec<&Node> = graph.nodes.iter().filter(|n| n.group.is_none()).collect();
    if !ungrouped.is_empty() {
        writeln!(out)?;
        for node in ungrouped {
            write_node(&mut out, "  ", node)?;
        }
    }

    if !graph.edges.is_empty() {
        writeln!(out)?;
        for edge in &graph.edges {
            write!(
                out,
                "  \"{}\" -> \"{}\" [taillabel=\"{}\", headlabel=\"{}\"",
                escape_string(&edge.from),
                escape_string(&edge.to),
                cardinality(edge.from_cardinality),
                cardinality(edge.to_cardinality)
            )?;
            if let Some(label) = &edge.label {
                write!(out, ", label=\"{}\"", escape_string(label))?;
            }
            writeln!(out, "];")?;
        }
    }

    writeln!(out, "}}")?;
    Ok(out)
}

fn write_node(out: &mut String, indent: &str, node: &Node) -> Result<(), GenerateError> {
    let mut label = escape_record(&node.label);
    if !node.columns.is_empty() {
        label.push('|');
        for column in &node.columns {
            label.push_str(&column_label(column));
            label.push_str("\\l");
        }
    }
    writeln!(
        out,
        "{}\"{}\" [label=\"{{{}}}\"];",
        indent,
        escape_string(&node.id),
        label
    )?;
    Ok(())
}

fn column_label(column: &Column) -> String {
    let mut label = format!("{} : {}", escape_record(&column.name), escape_record(&column.typ));
    match (column.is_pk, column.is_fk) {
        (true, true) => label.push_str(" PK FK"),
        (true, false) => label.push_str(" PK"),
        (false, true) => label.push_str(" FK"),
        (false, false) => {}
    }
    if column.null {
        label.push('?');
    }
    label
}

fn cardinality(cardinality: Cardinality) -> &'static str {
    match cardinality {
        Cardinality::One => "1",
        Cardinality::Many => "*",
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Record labels also reserve `{}|<>` and spaces around them.
fn escape_record(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '{' | '}' | '|' | '<' | '>' | '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digraph() {
        let db = crate::aml::parse("users\n  id int pk\n  name varchar(10) nullable\n\nposts\n  id int pk\n  author int -> users(id)\n")
            .into_value()
            .unwrap();
        let dot = generate(&db, DetailLevel::All).unwrap();
        assert!(dot.starts_with("digraph schema {\n"));
        assert!(dot.contains("  \"users\" [label=\"{users|id : int PK\\lname : varchar(10)?\\l}\"];\n"));
        assert!(dot.contains("  \"posts\" -> \"users\" [taillabel=\"*\", headlabel=\"1\"];\n"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_groups_become_clusters() {
        let mut db = crate::aml::parse("users\n  id int pk\n\nlogs\n  id int\n").into_value().unwrap();
        db.extra.insert(
            "groups".to_string(),
            serde_json::json!([{"name": "auth", "entities": [{"entity": "users"}]}]),
        );
        let dot = generate(&db, DetailLevel::Tables).unwrap();
        assert!(dot.contains("  subgraph cluster_0 {\n    label=\"auth\";\n    \"users\" [label=\"{users}\"];\n  }\n"));
        assert!(dot.contains("  \"logs\" [label=\"{logs}\"];\n"));
    }
}
