//! SQL statement tree produced by the grammar.

use super::lexer::{Token, TokenKind};
use crate::diagnostic::Position;
use crate::id::{EntityRef, Namespace};

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub value: String,
    pub quoted: bool,
    pub position: Position,
}

/// Dotted name such as `schema.table` or `table.column`.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    pub parts: Vec<Identifier>,
}

impl QualifiedName {
    pub fn last(&self) -> &str {
        self.parts.last().map(|p| p.value.as_str()).unwrap_or_default()
    }

    pub fn position(&self) -> Position {
        Position::merge(self.parts.iter().map(|p| &p.position))
    }

    /// Rightmost part is the entity, the rest fill schema, catalog, database.
    pub fn entity_ref(&self) -> EntityRef {
        Self::to_ref(&self.parts)
    }

    /// `schema.table.column` split into the table ref and the column name.
    pub fn split_column(&self) -> Option<(EntityRef, &str)> {
        let (column, table) = self.parts.split_last()?;
        if table.is_empty() {
            return None;
        }
        Some((Self::to_ref(table), column.value.as_str()))
    }

    fn to_ref(parts: &[Identifier]) -> EntityRef {
        let mut rev = parts.iter().rev().map(|p| p.value.clone());
        let entity = rev.next().unwrap_or_default();
        let schema = rev.next();
        let catalog = rev.next();
        let database = rev.next();
        EntityRef::new(
            Namespace {
                database,
                catalog,
                schema,
            },
            entity,
        )
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.parts.iter().map(|p| p.value.as_str()).collect();
        f.write_str(&names.join("."))
    }
}

/// Column mentioned inside an expression, `scope.name` or bare `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub scope: Option<String>,
    pub name: String,
}

/// An expression kept as normalized source text plus the columns it uses.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub text: String,
    pub columns: Vec<ColumnRef>,
    pub position: Position,
}

impl Expression {
    pub fn from_tokens(tokens: &[Token]) -> Self {
        Self {
            text: render_tokens(tokens, false),
            columns: column_refs(tokens),
            position: Position::merge(tokens.iter().map(|t| &t.position)),
        }
    }

    /// The single column this expression is, if it is nothing more.
    pub fn as_column(&self) -> Option<&str> {
        match self.columns.as_slice() {
            [column] if column.scope.is_none() && self.text.trim_matches(['"', '`']) == column.name => {
                Some(column.name.as_str())
            }
            _ => None,
        }
    }
}

/// Joins tokens with SQL-ish spacing. With `clean`, quoted identifiers lose
/// their quotes.
pub fn render_tokens(tokens: &[Token], clean: bool) -> String {
    let mut out = String::new();
    let mut prev: Option<&TokenKind> = None;
    for token in tokens {
        let kind = &token.kind;
        let glue = match (prev, kind) {
            (None, _) => true,
            (Some(TokenKind::LParen | TokenKind::Dot), _) => true,
            (Some(TokenKind::Op(op)), _) if op == "::" => true,
            (_, TokenKind::RParen | TokenKind::Comma | TokenKind::Dot) => true,
            (_, TokenKind::Op(op)) if op == "::" => true,
            (Some(TokenKind::Ident(_) | TokenKind::QuotedIdent(_)), TokenKind::LParen) => true,
            (_, TokenKind::QuotedIdent(s)) if s.is_empty() && token.text == "[]" => true,
            _ => false,
        };
        if !glue {
            out.push(' ');
        }
        match kind {
            TokenKind::QuotedIdent(value) if clean => out.push_str(value),
            _ => out.push_str(&token.text),
        }
        prev = Some(kind);
    }
    out
}

fn ident_value(kind: &TokenKind) -> Option<&str> {
    match kind {
        TokenKind::Ident(s) | TokenKind::QuotedIdent(s) => Some(s),
        _ => None,
    }
}

fn column_refs(tokens: &[Token]) -> Vec<ColumnRef> {
    let mut refs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let Some(first) = ident_value(&tokens[i].kind) else {
            i += 1;
            continue;
        };
        if i > 0 && tokens[i - 1].kind == TokenKind::Dot {
            i += 1;
            continue;
        }
        // Collect a dotted chain: a.b.c
        let mut parts = vec![first.to_string()];
        let mut j = i + 1;
        while j + 1 < tokens.len() && tokens[j].kind == TokenKind::Dot {
            match ident_value(&tokens[j + 1].kind) {
                Some(next) => {
                    parts.push(next.to_string());
                    j += 2;
                }
                None => break,
            }
        }
        let is_call = tokens.get(j).is_some_and(|t| t.kind == TokenKind::LParen);
        if !is_call {
            let name = parts.pop().unwrap_or_default();
            refs.push(ColumnRef {
                scope: parts.pop(),
                name,
            });
        }
        i = j;
    }
    refs
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<SelectStatement>),
    CreateTable(CreateTable),
    AlterTable(AlterTable),
    CreateIndex(CreateIndex),
    CreateType(CreateType),
    CommentOn(CommentOn),
    Update(UpdateStatement),
    Unknown(UnknownStatement),
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::Select(s) => s.position,
            Statement::CreateTable(s) => s.position,
            Statement::AlterTable(s) => s.position,
            Statement::CreateIndex(s) => s.position,
            Statement::CreateType(s) => s.position,
            Statement::CommentOn(s) => s.position,
            Statement::Update(s) => s.position,
            Statement::Unknown(s) => s.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub fields: Vec<SelectField>,
    pub tables: Vec<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectField {
    /// `*` or `scope.*`
    Wildcard {
        scope: Option<Identifier>,
        position: Position,
    },
    Expr {
        scope: Option<Identifier>,
        expression: Expression,
        alias: Option<Identifier>,
        /// Alias, or the cleaned expression when there is none.
        name: String,
        position: Position,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: QualifiedName,
    pub alias: Option<Identifier>,
    pub position: Position,
}

impl TableRef {
    /// What the rest of the query uses to refer to this table.
    pub fn reference_name(&self) -> &str {
        match &self.alias {
            Some(alias) => &alias.value,
            None => self.name.last(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Option<Expression>,
    pub using: Vec<Identifier>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expression: Expression,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub if_not_exists: bool,
    pub name: QualifiedName,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: Identifier,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
    pub position: Position,
}

impl ColumnDef {
    pub fn has(&self, pred: impl Fn(&ColumnConstraintKind) -> bool) -> bool {
        self.constraints.iter().any(|c| pred(&c.kind))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub text: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConstraint {
    pub name: Option<Identifier>,
    pub kind: ColumnConstraintKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraintKind {
    NotNull,
    Null,
    PrimaryKey,
    Unique,
    AutoIncrement,
    Default(Expression),
    Check(Expression),
    References(ForeignKeyRef),
    /// `GENERATED ALWAYS AS (expr)` or MySQL `AS (expr)`.
    Generated(Expression),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyRef {
    pub table: QualifiedName,
    pub columns: Vec<Identifier>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableConstraint {
    pub name: Option<Identifier>,
    pub kind: TableConstraintKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraintKind {
    PrimaryKey(Vec<Identifier>),
    Unique(Vec<Identifier>),
    ForeignKey {
        columns: Vec<Identifier>,
        reference: ForeignKeyRef,
    },
    Check(Expression),
    /// MySQL inline `KEY name (cols)` / `INDEX name (cols)`.
    Index(Vec<Identifier>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: QualifiedName,
    pub actions: Vec<AlterAction>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterAction {
    AddColumn(ColumnDef),
    AddConstraint(TableConstraint),
    Other { text: String, position: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub unique: bool,
    pub name: Option<Identifier>,
    pub table: QualifiedName,
    pub columns: Vec<Expression>,
    pub predicate: Option<Expression>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateType {
    pub name: QualifiedName,
    pub definition: TypeDefinition,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Enum(Vec<String>),
    Composite(Vec<ColumnDef>),
    /// `CREATE TYPE name;` without a body.
    Shell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentOn {
    pub target: CommentTarget,
    /// `None` for `IS NULL`.
    pub text: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommentTarget {
    Table(QualifiedName),
    Column(QualifiedName),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expression>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: Identifier,
    pub value: Expression,
}

/// A statement the grammar does not model, kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownStatement {
    pub text: String,
    pub position: Position,
}

impl UnknownStatement {
    /// Leading words, uppercased, e.g. `INSERT` or `DROP TABLE`.
    pub fn command(&self) -> String {
        let mut words = self
            .text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .map(str::to_uppercase);
        let first = words.next().unwrap_or_default();
        match first.as_str() {
            "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => match words.next() {
                Some(second) => format!("{} {}", first, second),
                None => first,
            },
            _ => first,
        }
    }
}
