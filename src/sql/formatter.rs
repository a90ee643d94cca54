//! Flattens statements into a uniform summary for tooling: what command it
//! is, which language family, whether it reads or writes, and what it
//! touches.

use super::ast::*;
use crate::diagnostic::Position;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    /// Data definition
    Ddl,
    /// Data query
    Dql,
    /// Data manipulation
    Dml,
    /// Data control
    Dcl,
    /// Transaction control
    Tcl,
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Schema,
    Read,
    Write,
    Transaction,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedStatement {
    pub command: String,
    pub language: Language,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<FormattedTable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FormattedField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<FormattedJoin>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedTable {
    /// Alias when present, otherwise the table name.
    pub name: String,
    /// Real table name, set when `name` is an alias.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedField {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub expression: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedJoin {
    pub kind: &'static str,
    pub table: FormattedTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
}

fn table(table: &TableRef) -> FormattedTable {
    match &table.alias {
        Some(alias) => FormattedTable {
            name: alias.value.clone(),
            table: Some(table.name.to_string()),
            position: table.position,
        },
        None => FormattedTable {
            name: table.name.to_string(),
            table: None,
            position: table.position,
        },
    }
}

fn named(name: &QualifiedName) -> FormattedTable {
    FormattedTable {
        name: name.to_string(),
        table: None,
        position: name.position(),
    }
}

fn classify(command: &str) -> (Language, Operation) {
    let first = command.split(' ').next().unwrap_or_default();
    match first {
        "SELECT" | "WITH" | "SHOW" | "EXPLAIN" => (Language::Dql, Operation::Read),
        "INSERT" | "UPDATE" | "DELETE" | "MERGE" | "COPY" | "UPSERT" => (Language::Dml, Operation::Write),
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "COMMENT" | "RENAME" => (Language::Ddl, Operation::Schema),
        "GRANT" | "REVOKE" => (Language::Dcl, Operation::Schema),
        "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" | "END" => {
            (Language::Tcl, Operation::Transaction)
        }
        _ => (Language::Unknown, Operation::Unknown),
    }
}

pub fn format_statement(statement: &Statement) -> FormattedStatement {
    let (command, tables, fields, joins) = match statement {
        Statement::Select(select) => {
            let fields = select
                .fields
                .iter()
                .map(|field| match field {
                    SelectField::Wildcard { scope, position } => FormattedField {
                        name: "*".to_string(),
                        scope: scope.as_ref().map(|s| s.value.clone()),
                        expression: "*".to_string(),
                        position: *position,
                    },
                    SelectField::Expr {
                        scope,
                        expression,
                        name,
                        position,
                        ..
                    } => FormattedField {
                        name: name.clone(),
                        scope: scope.as_ref().map(|s| s.value.clone()),
                        expression: expression.text.clone(),
                        position: *position,
                    },
                })
                .collect();
            let joins = select
                .joins
                .iter()
                .map(|join| FormattedJoin {
                    kind: join.kind.as_str(),
                    table: table(&join.table),
                    on: join.on.as_ref().map(|on| on.text.clone()),
                })
                .collect();
            ("SELECT".to_string(), select.tables.iter().map(table).collect(), fields, joins)
        }
        Statement::CreateTable(create) => {
            let fields = create
                .columns
                .iter()
                .map(|column| FormattedField {
                    name: column.name.value.clone(),
                    scope: None,
                    expression: column.data_type.text.clone(),
                    position: column.position,
                })
                .collect();
            ("CREATE TABLE".to_string(), vec![named(&create.name)], fields, Vec::new())
        }
        Statement::AlterTable(alter) => ("ALTER TABLE".to_string(), vec![named(&alter.table)], Vec::new(), Vec::new()),
        Statement::CreateIndex(index) => ("CREATE INDEX".to_string(), vec![named(&index.table)], Vec::new(), Vec::new()),
        Statement::CreateType(_) => ("CREATE TYPE".to_string(), Vec::new(), Vec::new(), Vec::new()),
        Statement::CommentOn(comment) => {
            let target = match &comment.target {
                CommentTarget::Table(name) => named(name),
                CommentTarget::Column(name) => match name.split_column() {
                    Some((entity, _)) => FormattedTable {
                        name: entity.to_string(),
                        table: None,
                        position: name.position(),
                    },
                    None => named(name),
                },
            };
            ("COMMENT".to_string(), vec![target], Vec::new(), Vec::new())
        }
        Statement::Update(update) => {
            let fields = update
                .assignments
                .iter()
                .map(|a| FormattedField {
                    name: a.column.value.clone(),
                    scope: None,
                    expression: a.value.text.clone(),
                    position: a.column.position.to(&a.value.position),
                })
                .collect();
            ("UPDATE".to_string(), vec![table(&update.table)], fields, Vec::new())
        }
        Statement::Unknown(unknown) => (unknown.command(), Vec::new(), Vec::new(), Vec::new()),
    };
    let (language, operation) = classify(&command);
    FormattedStatement {
        command,
        language,
        operation,
        tables,
        fields,
        joins,
        position: statement.position(),
    }
}

pub fn format_statements(statements: &[Statement]) -> Vec<FormattedStatement> {
    statements.iter().map(format_statement).collect()
}
