//! Markdown documentation: one attribute table per entity and an embedded
//! Mermaid diagram.

use super::graph::{DetailLevel, Graph, Node};
use super::mermaid;
use crate::error::GenerateError;
use crate::model::Database;
use std::fmt::Write;
use unicode_width::UnicodeWidthStr;

pub fn generate(db: &Database, detail: DetailLevel) -> Result<String, GenerateError> {
    let graph = Graph::from_database(db, detail);
    let mut out = String::new();

    let title = db
        .stats
        .as_ref()
        .and_then(|s| s.name.as_deref())
        .unwrap_or("Database schema");
    writeln!(out, "# {}", title)?;

    if !graph.nodes.is_empty() {
        writeln!(out)?;
        writeln!(out, "## Entities")?;
        for node in &graph.nodes {
            write_node(&mut out, node)?;
        }
    }

    if !db.types.is_empty() {
        writeln!(out)?;
        writeln!(out, "## Types")?;
        writeln!(out)?;
        for typ in &db.types {
            match (&typ.values, &typ.definition) {
                (Some(values), _) => writeln!(out, "- **{}**: {}", typ.id(), values.join(", "))?,
                (None, Some(definition)) => writeln!(out, "- **{}**: `{}`", typ.id(), definition)?,
                (None, None) => writeln!(out, "- **{}**", typ.id())?,
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "## Diagram")?;
    writeln!(out)?;
    writeln!(out, "```mermaid")?;
    out.push_str(&mermaid::generate(db, detail)?);
    writeln!(out, "```")?;
    Ok(out)
}

fn write_node(out: &mut String, node: &Node) -> Result<(), GenerateError> {
    writeln!(out)?;
    writeln!(out, "### {}", node.label)?;
    if let Some(doc) = &node.doc {
        writeln!(out)?;
        writeln!(out, "{}", doc)?;
    }
    if node.columns.is_empty() {
        return Ok(());
    }

    let rows: Vec<[String; 4]> = node
        .columns
        .iter()
        .map(|c| {
            let mut constraints = Vec::new();
            if c.is_pk {
                constraints.push("PK");
            }
            if c.is_fk {
                constraints.push("FK");
            }
            if !c.null {
                constraints.push("not null");
            }
            [
                c.name.clone(),
                c.typ.clone(),
                constraints.join(", "),
                c.doc.clone().unwrap_or_default(),
            ]
        })
        .collect();
    writeln!(out)?;
    write_table(out, ["Attribute", "Type", "Constraints", "Description"], &rows)
}

/// Pipe table padded to the display width of each column.
fn write_table(out: &mut String, header: [&str; 4], rows: &[[String; 4]]) -> Result<(), GenerateError> {
    let mut widths = header.map(UnicodeWidthStr::width);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{}{}", cell, " ".repeat(width - cell.width())))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    writeln!(out, "{}", line(header.to_vec()))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "|-{}-|", rule.join("-|-"))?;
    for row in rows {
        writeln!(out, "{}", line(row.iter().map(String::as_str).collect()))?;
    }
    Ok(())
}
