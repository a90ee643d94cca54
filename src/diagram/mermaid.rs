//! Mermaid `erDiagram` output with crow's-foot cardinalities.

use super::graph::{DetailLevel, Graph};
use crate::error::GenerateError;
use crate::model::{Cardinality, Database};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

pub fn generate(db: &Database, detail: DetailLevel) -> Result<String, GenerateError> {
    let graph = Graph::from_database(db, detail);
    let mut names = Names::default();
    let mut out = String::new();
    writeln!(out, "erDiagram")?;

    for node in &graph.nodes {
        writeln!(out, "    {} {{", names.get(&node.id))?;
        for column in &node.columns {
            write!(out, "        {} {}", word(&column.typ), word(&column.name))?;
            match (column.is_pk, column.is_fk) {
                (true, true) => write!(out, " PK, FK")?,
                (true, false) => write!(out, " PK")?,
                (false, true) => write!(out, " FK")?,
                (false, false) => {}
            }
            if let Some(doc) = &column.doc {
                write!(out, " \"{}\"", doc.replace('"', "'"))?;
            }
            writeln!(out)?;
        }
        writeln!(out, "    }}")?;
    }

    for edge in &graph.edges {
        let from = match edge.from_cardinality {
            Cardinality::One => "||",
            Cardinality::Many => "}o",
        };
        let to = match edge.to_cardinality {
            Cardinality::One => "||",
            Cardinality::Many => "o{",
        };
        writeln!(
            out,
            "    {} {}--{} {} : \"{}\"",
            names.get(&edge.from),
            from,
            to,
            names.get(&edge.to),
            edge.label.as_deref().unwrap_or_default().replace('"', "'")
        )?;
    }
    Ok(out)
}

/// Mermaid ids per entity id. Ids that sanitize to a name already taken
/// get a numeric suffix.
#[derive(Default)]
struct Names<'a> {
    assigned: HashMap<&'a str, String>,
    taken: HashSet<String>,
}

impl<'a> Names<'a> {
    fn get(&mut self, id: &'a str) -> String {
        if let Some(name) = self.assigned.get(id) {
            return name.clone();
        }
        let base = name(id);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        self.taken.insert(candidate.clone());
        self.assigned.insert(id, candidate.clone());
        candidate
    }
}

/// Entity names keep letters, digits, `_` and `-`.
fn name(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Attribute words additionally keep brackets and parentheses.
fn word(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '(' | ')' | '[' | ']') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_er_diagram() {
        let db = crate::aml::parse(
            "app.users\n  id int pk\n  name \"character varying\" | display name\n\nposts\n  id int pk\n  author int -> app.users(id)\n  editor int -- app.users(id)\n",
        )
        .into_value()
        .unwrap();
        let mermaid = generate(&db, DetailLevel::All).unwrap();
        assert!(mermaid.starts_with("erDiagram\n    app_users {\n        int id PK\n        character_varying name \"display name\"\n    }\n"));
        assert!(mermaid.contains("        int author FK\n"));
        assert!(mermaid.contains("    posts }o--|| app_users : \"\"\n"));
        assert!(mermaid.contains("    posts ||--|| app_users : \"\"\n"));
    }

    #[test]
    fn test_sanitized_names_stay_distinct() {
        let db = crate::aml::parse(
            "app.users\n  id int pk\n\napp_users\n  id int pk\n  owner int -> app.users(id)\n  peer int -> app_users(id)\n",
        )
        .into_value()
        .unwrap();
        let mermaid = generate(&db, DetailLevel::All).unwrap();
        assert!(mermaid.contains("    app_users {\n"));
        assert!(mermaid.contains("    app_users_2 {\n"));
        assert!(mermaid.contains("    app_users_2 }o--|| app_users : \"\"\n"));
        assert!(mermaid.contains("    app_users_2 }o--|| app_users_2 : \"\"\n"));
    }
}
