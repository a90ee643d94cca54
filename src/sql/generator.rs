//! Schema model to SQL DDL.

use super::types::spell_type;
use super::SqlDialect;
use crate::error::GenerateError;
use crate::id::{AttributePath, Namespace};
use crate::model::{Attribute, Database, Entity, Index};
use std::fmt::Write;

/// Emit types, tables (in entity order) with their indexes and comments,
/// then foreign keys as `ALTER TABLE` statements.
pub fn generate(db: &Database, dialect: SqlDialect) -> Result<String, GenerateError> {
    let dialect = match dialect {
        SqlDialect::Auto => SqlDialect::Generic,
        other => other,
    };
    Generator { db, dialect }.run()
}

struct Generator<'a> {
    db: &'a Database,
    dialect: SqlDialect,
}

fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn is_inline_unique(index: &Index, path: &AttributePath) -> bool {
    index.unique
        && index.name.is_none()
        && index.partial.is_none()
        && index.definition.is_none()
        && index.attrs.len() == 1
        && &index.attrs[0] == path
}

fn is_constraint_unique(index: &Index) -> bool {
    index.unique
        && index.partial.is_none()
        && index.definition.is_none()
        && !index.attrs.is_empty()
        && !(index.name.is_none() && index.attrs.len() == 1)
}

impl<'a> Generator<'a> {
    fn mysql(&self) -> bool {
        self.dialect == SqlDialect::MySQL
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_ident(name)
    }

    fn qualified(&self, namespace: &Namespace, name: &str) -> String {
        let mut parts: Vec<String> = [&namespace.database, &namespace.catalog, &namespace.schema]
            .into_iter()
            .flatten()
            .map(|s| self.ident(s))
            .collect();
        parts.push(self.ident(name));
        parts.join(".")
    }

    fn columns(&self, attrs: &[AttributePath]) -> String {
        attrs
            .iter()
            .map(|a| self.ident(a.head()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn constraint_prefix(&self, name: &Option<String>) -> String {
        match name {
            Some(name) => format!("CONSTRAINT {} ", self.ident(name)),
            None => String::new(),
        }
    }

    fn run(&self) -> Result<String, GenerateError> {
        let mut sections = Vec::new();

        let types = self.types()?;
        if !types.is_empty() {
            sections.push(types);
        }
        for entity in &self.db.entities {
            sections.push(self.table(entity)?);
        }
        let relations = self.relations()?;
        if !relations.is_empty() {
            sections.push(relations);
        }
        Ok(sections.join("\n"))
    }

    fn types(&self) -> Result<String, GenerateError> {
        let mut out = String::new();
        for typ in &self.db.types {
            let name = self.qualified(&typ.namespace, &typ.name);
            match (&typ.values, &typ.definition) {
                // MySQL inlines enums into column types
                (Some(_), _) if self.mysql() => {}
                (Some(values), _) => {
                    let values: Vec<String> = values.iter().map(|v| string_literal(v)).collect();
                    writeln!(out, "CREATE TYPE {} AS ENUM ({});", name, values.join(", "))?;
                }
                (None, Some(_)) if self.mysql() => {
                    return Err(GenerateError::unsupported("mysql", format!("composite type {}", typ.id())));
                }
                (None, Some(definition)) => writeln!(out, "CREATE TYPE {} AS ({});", name, definition)?,
                (None, None) if self.mysql() => {
                    return Err(GenerateError::unsupported("mysql", format!("shell type {}", typ.id())));
                }
                (None, None) => writeln!(out, "CREATE TYPE {};", name)?,
            }
        }
        Ok(out)
    }

    fn column_type(&self, attr: &Attribute) -> String {
        if self.mysql() {
            let enum_values = self
                .db
                .types
                .iter()
                .find(|t| t.name == attr.typ)
                .and_then(|t| t.values.as_ref());
            if let Some(values) = enum_values {
                let values: Vec<String> = values.iter().map(|v| string_literal(v)).collect();
                return format!("enum({})", values.join(","));
            }
        }
        spell_type(&attr.typ, self.dialect)
    }

    fn column(&self, entity: &Entity, attr: &Attribute) -> String {
        let path = AttributePath::name(&attr.name);
        let mut line = format!("{} {}", self.ident(&attr.name), self.column_type(attr));

        let inline_pk = entity.is_single_pk(&path) && entity.pk.as_ref().is_some_and(|pk| pk.name.is_none());
        if inline_pk {
            line.push_str(" PRIMARY KEY");
        } else if !attr.null {
            line.push_str(" NOT NULL");
        }
        if attr.extra.get("autoIncrement").and_then(|v| v.as_bool()) == Some(true) {
            match self.dialect {
                SqlDialect::MySQL => line.push_str(" AUTO_INCREMENT"),
                SqlDialect::PostgreSQL => line.push_str(" GENERATED BY DEFAULT AS IDENTITY"),
                _ => {}
            }
        }
        match (&attr.default, attr.generated) {
            (Some(expression), true) => line.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", expression)),
            (Some(default), false) => line.push_str(&format!(" DEFAULT {}", default)),
            (None, _) => {}
        }
        if entity.indexes.iter().any(|i| is_inline_unique(i, &path)) {
            line.push_str(" UNIQUE");
        }
        if let (true, Some(doc)) = (self.mysql(), &attr.doc) {
            line.push_str(&format!(" COMMENT {}", string_literal(doc)));
        }
        line
    }

    fn table(&self, entity: &Entity) -> Result<String, GenerateError> {
        let table = self.qualified(&entity.namespace, &entity.name);
        let mut lines: Vec<String> = entity.attrs.iter().map(|a| self.column(entity, a)).collect();

        if let Some(pk) = &entity.pk {
            let inline = pk.name.is_none() && pk.attrs.len() == 1 && entity.has_attribute(&pk.attrs[0]);
            if !inline {
                lines.push(format!(
                    "{}PRIMARY KEY ({})",
                    self.constraint_prefix(&pk.name),
                    self.columns(&pk.attrs)
                ));
            }
        }
        for index in entity.indexes.iter().filter(|i| is_constraint_unique(i)) {
            lines.push(format!(
                "{}UNIQUE ({})",
                self.constraint_prefix(&index.name),
                self.columns(&index.attrs)
            ));
        }
        for check in &entity.checks {
            lines.push(format!("{}CHECK ({})", self.constraint_prefix(&check.name), check.predicate));
        }

        let mut out = String::new();
        if lines.is_empty() {
            writeln!(out, "CREATE TABLE {} ();", table)?;
        } else {
            writeln!(out, "CREATE TABLE {} (", table)?;
            writeln!(out, "  {}", lines.join(",\n  "))?;
            writeln!(out, ");")?;
        }

        for index in &entity.indexes {
            let path_unique = index.attrs.len() == 1 && is_inline_unique(index, &index.attrs[0]);
            if path_unique || is_constraint_unique(index) {
                continue;
            }
            let name = match (&index.name, self.mysql()) {
                (Some(name), _) => format!(" {}", self.ident(name)),
                (None, true) => {
                    let cols: Vec<&str> = index.attrs.iter().map(|a| a.head()).collect();
                    format!(" {}", self.ident(&format!("{}_{}_idx", entity.name, cols.join("_"))))
                }
                (None, false) => String::new(),
            };
            let columns = match &index.definition {
                Some(definition) => definition.clone(),
                None => self.columns(&index.attrs),
            };
            write!(
                out,
                "CREATE {}INDEX{} ON {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                name,
                table,
                columns
            )?;
            if let Some(predicate) = &index.partial {
                write!(out, " WHERE {}", predicate)?;
            }
            writeln!(out, ";")?;
        }

        if !self.mysql() {
            if let Some(doc) = &entity.doc {
                writeln!(out, "COMMENT ON TABLE {} IS {};", table, string_literal(doc))?;
            }
            for attr in &entity.attrs {
                if let Some(doc) = &attr.doc {
                    writeln!(
                        out,
                        "COMMENT ON COLUMN {}.{} IS {};",
                        table,
                        self.ident(&attr.name),
                        string_literal(doc)
                    )?;
                }
            }
        }
        Ok(out)
    }

    fn relations(&self) -> Result<String, GenerateError> {
        let mut out = String::new();
        for relation in &self.db.relations {
            let src = &relation.src.entity;
            let reference = &relation.reference.entity;
            write!(
                out,
                "ALTER TABLE {} ADD {}FOREIGN KEY ({}) REFERENCES {} ({})",
                self.qualified(&src.namespace, &src.entity),
                self.constraint_prefix(&relation.name),
                self.columns(&relation.src.attrs),
                self.qualified(&reference.namespace, &reference.entity),
                self.columns(&relation.reference.attrs),
            )?;
            if let Some(action) = &relation.on_delete {
                write!(out, " ON DELETE {}", action.to_uppercase())?;
            }
            if let Some(action) = &relation.on_update {
                write!(out, " ON UPDATE {}", action.to_uppercase())?;
            }
            writeln!(out, ";")?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EntityRef;
    use crate::model::{PrimaryKey, Relation, Type};
    use crate::sql::parse;

    fn sample() -> Database {
        let mut users = Entity::new(Namespace::default(), "users");
        users.attrs.push(Attribute::new("id", "uuid"));
        let mut email = Attribute::new("email", "varchar(255)");
        email.doc = Some("login".to_string());
        users.attrs.push(email);
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

        let mut posts = Entity::new(Namespace::default(), "posts");
        posts.attrs.push(Attribute::new("id", "int"));
        posts.attrs.push(Attribute::new("author_id", "uuid"));
        let mut mood = Attribute::new("mood", "mood");
        mood.null = true;
        posts.attrs.push(mood);
        posts.pk = Some(PrimaryKey {
            name: Some("posts_pk".to_string()),
            attrs: vec![AttributePath::name("id")],
        });

        let mut relation = Relation::many_to_one(
            EntityRef::named("posts"),
            vec![AttributePath::name("author_id")],
            EntityRef::named("users"),
            vec![AttributePath::name("id")],
        );
        relation.on_delete = Some("cascade".to_string());

        Database {
            entities: vec![users, posts],
            relations: vec![relation],
            types: vec![Type {
                name: "mood".to_string(),
                values: Some(vec!["sad".to_string(), "happy".to_string()]),
                ..Type::default()
            }],
            ..Database::default()
        }
    }

    #[test]
    fn test_generate_postgres() {
        let sql = generate(&sample(), SqlDialect::PostgreSQL).unwrap();
        assert!(sql.starts_with("CREATE TYPE mood AS ENUM ('sad', 'happy');\n"));
        assert!(sql.contains("CREATE TABLE users (\n  id uuid PRIMARY KEY,\n  email varchar(255) NOT NULL UNIQUE\n);"));
        assert!(sql.contains("  CONSTRAINT posts_pk PRIMARY KEY (id)\n"));
        assert!(sql.contains("COMMENT ON COLUMN users.email IS 'login';"));
        assert!(sql.ends_with(
            "ALTER TABLE posts ADD FOREIGN KEY (author_id) REFERENCES users (id) ON DELETE CASCADE;\n"
        ));
    }

    #[test]
    fn test_generate_mysql_spelling() {
        let sql = generate(&sample(), SqlDialect::MySQL).unwrap();
        assert!(!sql.contains("CREATE TYPE"));
        assert!(sql.contains("  id char(36) PRIMARY KEY,\n"));
        assert!(sql.contains("  mood enum('sad','happy'),\n"));
        assert!(sql.contains("COMMENT 'login'"));
    }

    #[test]
    fn test_mysql_composite_type_is_unsupported() {
        let mut db = sample();
        db.types.push(Type {
            name: "point".to_string(),
            definition: Some("x int, y int".to_string()),
            ..Type::default()
        });
        let err = generate(&db, SqlDialect::MySQL).unwrap_err();
        assert!(matches!(err, GenerateError::Unsupported { dialect: "mysql", .. }));
    }

    #[test]
    fn test_generated_sql_reimports() {
        let db = sample();
        let sql = generate(&db, SqlDialect::PostgreSQL).unwrap();
        let result = parse(&sql, SqlDialect::PostgreSQL);
        assert!(result.is_clean(), "{:?}", result.diagnostics);
        let back = result.into_value().unwrap();
        assert_eq!(back.entities.len(), 2);
        assert_eq!(back.entities[0].pk, db.entities[0].pk);
        assert_eq!(back.entities[1].pk, db.entities[1].pk);
        assert_eq!(back.entities[0].indexes, db.entities[0].indexes);
        assert_eq!(back.relations, db.relations);
        assert_eq!(back.types, db.types);
        assert_eq!(generate(&back, SqlDialect::PostgreSQL).unwrap(), sql);
    }

    #[test]
    fn test_shell_type_reimports() {
        let mut db = sample();
        db.types.push(Type {
            name: "pending".to_string(),
            ..Type::default()
        });
        let sql = generate(&db, SqlDialect::PostgreSQL).unwrap();
        assert!(sql.contains("CREATE TYPE pending;\n"));
        let result = parse(&sql, SqlDialect::PostgreSQL);
        assert!(result.is_clean(), "{:?}", result.diagnostics);
        assert_eq!(result.into_value().unwrap().types, db.types);

        let err = generate(&db, SqlDialect::MySQL).unwrap_err();
        assert!(matches!(err, GenerateError::Unsupported { dialect: "mysql", .. }));
    }
}
