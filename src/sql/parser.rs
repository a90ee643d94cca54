//! SQL grammar: recursive descent over lexer tokens.
//!
//! A failing statement is reported and skipped up to the next `;`, so one
//! bad statement never hides the rest of a script.

use super::ast::*;
use super::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::diagnostic::{Diagnostic, DiagnosticKind, ParseResult, Position};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum SqlParseError {
    #[error("Expected {expected}, found {found}")]
    Expected {
        expected: String,
        found: String,
        position: Position,
    },
    #[error("{message}")]
    Unsupported { message: String, position: Position },
}

impl SqlParseError {
    pub fn position(&self) -> Position {
        match self {
            SqlParseError::Expected { position, .. } | SqlParseError::Unsupported { position, .. } => *position,
        }
    }

    fn into_diagnostic(self) -> Diagnostic {
        let kind = match &self {
            SqlParseError::Expected { .. } => DiagnosticKind::UnexpectedToken,
            SqlParseError::Unsupported { .. } => DiagnosticKind::UnsupportedStatement,
        };
        let position = self.position();
        Diagnostic::error(kind, self.to_string(), position)
    }
}

type PResult<T> = Result<T, SqlParseError>;

/// Parse a script into statements. The value is absent only when errors
/// occurred and nothing could be recovered.
pub fn parse_statements(input: &str) -> ParseResult<Vec<Statement>> {
    let (tokens, mut diagnostics) = Lexer::new(input).tokenize();
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
        diagnostics: Vec::new(),
    };
    let statements = parser.parse();
    diagnostics.append(&mut parser.diagnostics);
    if statements.is_empty() && diagnostics.iter().any(Diagnostic::is_error) {
        ParseResult::failure(diagnostics)
    } else {
        ParseResult::partial(statements, diagnostics)
    }
}

fn is_ident(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Ident(_) | TokenKind::QuotedIdent(_))
}

fn is_identifier_like(kind: &TokenKind) -> bool {
    match kind {
        TokenKind::Keyword(k) => !k.is_reserved(),
        other => is_ident(other),
    }
}

/// Keywords that can start a column constraint and so end a data type.
fn starts_column_constraint(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Keyword(
            Keyword::Not
                | Keyword::Null
                | Keyword::Primary
                | Keyword::Unique
                | Keyword::Default
                | Keyword::References
                | Keyword::Check
                | Keyword::Constraint
                | Keyword::Generated
                | Keyword::AutoIncrement
                | Keyword::Comment
                | Keyword::As
                | Keyword::On
        )
    )
}

fn ends_clause(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Keyword(
            Keyword::Where
                | Keyword::Group
                | Keyword::Having
                | Keyword::Order
                | Keyword::Limit
                | Keyword::Offset
                | Keyword::Union
        )
    )
}

fn starts_join(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Keyword(
            Keyword::Join | Keyword::Inner | Keyword::Left | Keyword::Right | Keyword::Full | Keyword::Cross
        )
    )
}

fn is_word(kind: &TokenKind, word: &str) -> bool {
    matches!(kind, TokenKind::Ident(w) if w.eq_ignore_ascii_case(word))
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &Token {
        // tokenize() always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, n: usize) -> &TokenKind {
        self.tokens.get(self.pos + n).map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, keyword: Keyword) -> bool {
        self.current().is_keyword(keyword)
    }

    fn eat(&mut self, keyword: Keyword) -> bool {
        if self.at(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kind(&mut self, kind: &TokenKind) -> bool {
        if self.kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if is_word(self.kind(), word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expected(&self, what: impl Into<String>) -> SqlParseError {
        let token = self.current();
        let found = match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", token.text),
        };
        SqlParseError::Expected {
            expected: what.into(),
            found,
            position: token.position,
        }
    }

    fn expect(&mut self, keyword: Keyword) -> PResult<Token> {
        if self.at(keyword) {
            Ok(self.advance())
        } else {
            Err(self.expected(keyword.as_str()))
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if *self.kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.expected(what))
        }
    }

    fn position_since(&self, start: usize) -> Position {
        if self.pos > start {
            Position::merge(self.tokens[start..self.pos].iter().map(|t| &t.position))
        } else {
            self.current().position
        }
    }

    fn skip_to_statement_end(&mut self) {
        while !matches!(self.kind(), TokenKind::Semicolon | TokenKind::Eof) {
            self.advance();
        }
    }

    /// Skips a balanced parenthesized group starting at `(`.
    fn skip_group(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                TokenKind::Semicolon | TokenKind::Eof => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn identifier(token: &Token) -> Option<Identifier> {
        let (value, quoted) = match &token.kind {
            TokenKind::Ident(s) => (s.clone(), false),
            TokenKind::QuotedIdent(s) => (s.clone(), true),
            TokenKind::Keyword(k) if !k.is_reserved() => (token.text.clone(), false),
            _ => return None,
        };
        Some(Identifier {
            value,
            quoted,
            position: token.position,
        })
    }

    fn ident(&mut self, what: &str) -> PResult<Identifier> {
        match Self::identifier(self.current()) {
            Some(ident) => {
                self.advance();
                Ok(ident)
            }
            None => Err(self.expected(what)),
        }
    }

    fn qualified_name(&mut self, what: &str) -> PResult<QualifiedName> {
        let mut parts = vec![self.ident(what)?];
        while *self.kind() == TokenKind::Dot {
            self.advance();
            parts.push(self.ident(what)?);
        }
        Ok(QualifiedName { parts })
    }

    /// `( col [ASC|DESC], ... )`, MySQL prefix lengths skipped.
    fn ident_list(&mut self) -> PResult<Vec<Identifier>> {
        self.expect_kind(TokenKind::LParen, "'('")?;
        let mut idents = Vec::new();
        loop {
            idents.push(self.ident("column name")?);
            if *self.kind() == TokenKind::LParen {
                self.skip_group();
            }
            if !self.eat(Keyword::Asc) {
                self.eat(Keyword::Desc);
            }
            match self.kind() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(idents);
                }
                _ => return Err(self.expected("',' or ')'")),
            }
        }
    }

    fn if_not_exists(&mut self) -> PResult<bool> {
        if self.eat(Keyword::If) {
            self.expect(Keyword::Not)?;
            self.expect(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Token range of an expression ending before a depth-0 stop token.
    fn expression_range(&mut self, stop: impl Fn(&TokenKind) -> bool) -> (usize, usize) {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof | TokenKind::Semicolon => break,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                kind if depth == 0 && stop(kind) => break,
                _ => {}
            }
            self.advance();
        }
        (start, self.pos)
    }

    fn expression_until(&mut self, stop: impl Fn(&TokenKind) -> bool, what: &str) -> PResult<Expression> {
        let (start, end) = self.expression_range(stop);
        if start == end {
            return Err(self.expected(what));
        }
        Ok(Expression::from_tokens(&self.tokens[start..end]))
    }

    fn parenthesized(&mut self) -> PResult<Expression> {
        self.expect_kind(TokenKind::LParen, "'('")?;
        let expression = self.expression_until(|_| false, "expression")?;
        self.expect_kind(TokenKind::RParen, "')'")?;
        Ok(expression)
    }

    fn parse(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            while self.eat_kind(&TokenKind::Semicolon) {}
            if *self.kind() == TokenKind::Eof {
                break;
            }
            match self.statement() {
                Ok(statement) => {
                    trace!(position = %statement.position(), "parsed statement");
                    statements.push(statement);
                    if !matches!(self.kind(), TokenKind::Semicolon | TokenKind::Eof) {
                        let err = self.expected("';'");
                        self.diagnostics.push(err.into_diagnostic());
                        self.skip_to_statement_end();
                    }
                }
                Err(err) => {
                    trace!(%err, "skipping statement");
                    self.diagnostics.push(err.into_diagnostic());
                    self.skip_to_statement_end();
                }
            }
        }
        statements
    }

    fn statement(&mut self) -> PResult<Statement> {
        let start = self.pos;
        let kind = self.kind().clone();
        let next = self.peek_kind(1).clone();
        match (kind, next) {
            (TokenKind::Keyword(Keyword::Select), _) => Ok(Statement::Select(Box::new(self.select()?))),
            (TokenKind::Keyword(Keyword::Create), _) => self.create(start),
            (TokenKind::Keyword(Keyword::Alter), TokenKind::Keyword(Keyword::Table)) => self.alter_table(),
            (TokenKind::Keyword(Keyword::Comment), TokenKind::Keyword(Keyword::On)) => self.comment_on(start),
            (TokenKind::Keyword(Keyword::Update), _) => self.update(),
            _ => Ok(self.unknown(start)),
        }
    }

    fn unknown(&mut self, start: usize) -> Statement {
        self.skip_to_statement_end();
        let end = self.pos.max(start + 1).min(self.tokens.len());
        let from = self.tokens[start].position.offset.start;
        let to = self.tokens[end - 1].position.offset.end.max(from);
        Statement::Unknown(UnknownStatement {
            text: self.input.get(from..to).unwrap_or_default().to_string(),
            position: Position::merge(self.tokens[start..end].iter().map(|t| &t.position)),
        })
    }

    // SELECT

    fn select(&mut self) -> PResult<SelectStatement> {
        let start = self.pos;
        self.expect(Keyword::Select)?;
        let distinct = self.eat(Keyword::Distinct);
        if !distinct {
            self.eat(Keyword::All);
        }

        let mut fields = vec![self.select_field()?];
        while self.eat_kind(&TokenKind::Comma) {
            fields.push(self.select_field()?);
        }

        self.expect(Keyword::From)?;
        let mut tables = vec![self.table_ref()?];
        while self.eat_kind(&TokenKind::Comma) {
            tables.push(self.table_ref()?);
        }
        let joins = self.joins()?;

        let where_clause = if self.eat(Keyword::Where) {
            Some(self.expression_until(ends_clause, "condition")?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.eat(Keyword::Group) {
            self.expect(Keyword::By)?;
            loop {
                group_by.push(self.expression_until(
                    |k| ends_clause(k) || *k == TokenKind::Comma,
                    "grouping expression",
                )?);
                if !self.eat_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let having = if self.eat(Keyword::Having) {
            Some(self.expression_until(ends_clause, "condition")?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.eat(Keyword::Order) {
            self.expect(Keyword::By)?;
            loop {
                let expression = self.expression_until(
                    |k| {
                        ends_clause(k)
                            || matches!(k, TokenKind::Comma | TokenKind::Keyword(Keyword::Asc | Keyword::Desc))
                            || is_word(k, "nulls")
                    },
                    "ordering expression",
                )?;
                let descending = self.eat(Keyword::Desc);
                if !descending {
                    self.eat(Keyword::Asc);
                }
                if self.eat_word("nulls") {
                    self.advance();
                }
                order_by.push(OrderBy { expression, descending });
                if !self.eat_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut limit = None;
        let mut offset = None;
        if self.eat(Keyword::Limit) {
            let first = self.expression_until(|k| ends_clause(k) || *k == TokenKind::Comma, "limit")?;
            if self.eat_kind(&TokenKind::Comma) {
                // MySQL: LIMIT offset, count
                offset = Some(first);
                limit = Some(self.expression_until(ends_clause, "limit")?);
            } else {
                limit = Some(first);
            }
        }
        if self.eat(Keyword::Offset) {
            offset = Some(self.expression_until(|k| ends_clause(k) || is_word(k, "rows"), "offset")?);
            if !self.eat_word("rows") {
                self.eat_word("row");
            }
        }
        if self.at(Keyword::Union) {
            return Err(SqlParseError::Unsupported {
                message: "UNION is not supported".to_string(),
                position: self.current().position,
            });
        }

        Ok(SelectStatement {
            distinct,
            fields,
            tables,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
            position: self.position_since(start),
        })
    }

    fn select_field(&mut self) -> PResult<SelectField> {
        let start = self.pos;
        if *self.kind() == TokenKind::Star {
            let token = self.advance();
            return Ok(SelectField::Wildcard {
                scope: None,
                position: token.position,
            });
        }
        if is_identifier_like(self.kind())
            && *self.peek_kind(1) == TokenKind::Dot
            && *self.peek_kind(2) == TokenKind::Star
        {
            let scope = self.ident("table name")?;
            self.advance();
            self.advance();
            return Ok(SelectField::Wildcard {
                scope: Some(scope),
                position: self.position_since(start),
            });
        }

        let (begin, mut end) = self.expression_range(|k| {
            matches!(
                k,
                TokenKind::Comma | TokenKind::Keyword(Keyword::From | Keyword::As)
            ) || ends_clause(k)
        });
        if begin == end {
            return Err(self.expected("select field"));
        }

        let mut alias = None;
        if self.eat(Keyword::As) {
            alias = Some(self.ident("alias")?);
        } else if end - begin >= 2 && is_ident(&self.tokens[end - 1].kind) {
            let before = &self.tokens[end - 2].kind;
            let operand_end = is_ident(before)
                || matches!(
                    before,
                    TokenKind::RParen
                        | TokenKind::Num(_)
                        | TokenKind::Str(_)
                        | TokenKind::Keyword(Keyword::End | Keyword::Null)
                );
            if operand_end {
                alias = Self::identifier(&self.tokens[end - 1]);
                end -= 1;
            }
        }

        let body = &self.tokens[begin..end];
        let (scope, tokens) = match body {
            [table, dot, column] if is_ident(&table.kind) && dot.kind == TokenKind::Dot && is_ident(&column.kind) => {
                (Self::identifier(table), &body[2..])
            }
            _ => (None, body),
        };
        let expression = Expression::from_tokens(tokens);
        let name = match &alias {
            Some(alias) => alias.value.clone(),
            None => render_tokens(tokens, true),
        };
        Ok(SelectField::Expr {
            scope,
            expression,
            alias,
            name,
            position: self.position_since(start),
        })
    }

    fn table_ref(&mut self) -> PResult<TableRef> {
        let start = self.pos;
        if *self.kind() == TokenKind::LParen {
            return Err(SqlParseError::Unsupported {
                message: "Subqueries in FROM are not supported".to_string(),
                position: self.current().position,
            });
        }
        let name = self.qualified_name("table name")?;
        let alias = if self.eat(Keyword::As) {
            Some(self.ident("alias")?)
        } else if is_ident(self.kind()) {
            Some(self.ident("alias")?)
        } else {
            None
        };
        Ok(TableRef {
            name,
            alias,
            position: self.position_since(start),
        })
    }

    fn joins(&mut self) -> PResult<Vec<Join>> {
        let mut joins = Vec::new();
        loop {
            let start = self.pos;
            let kind = match self.kind().clone() {
                TokenKind::Keyword(Keyword::Join) => JoinKind::Inner,
                TokenKind::Keyword(Keyword::Inner) => {
                    self.advance();
                    JoinKind::Inner
                }
                TokenKind::Keyword(Keyword::Left) => {
                    self.advance();
                    self.eat(Keyword::Outer);
                    JoinKind::Left
                }
                TokenKind::Keyword(Keyword::Right) => {
                    self.advance();
                    self.eat(Keyword::Outer);
                    JoinKind::Right
                }
                TokenKind::Keyword(Keyword::Full) => {
                    self.advance();
                    self.eat(Keyword::Outer);
                    JoinKind::Full
                }
                TokenKind::Keyword(Keyword::Cross) => {
                    self.advance();
                    JoinKind::Cross
                }
                _ => return Ok(joins),
            };
            self.expect(Keyword::Join)?;
            let table = self.table_ref()?;
            let on = if self.eat(Keyword::On) {
                Some(self.expression_until(|k| ends_clause(k) || starts_join(k), "join condition")?)
            } else {
                None
            };
            let using = if self.eat(Keyword::Using) {
                self.ident_list()?
            } else {
                Vec::new()
            };
            joins.push(Join {
                kind,
                table,
                on,
                using,
                position: self.position_since(start),
            });
        }
    }

    // CREATE

    fn create(&mut self, start: usize) -> PResult<Statement> {
        self.expect(Keyword::Create)?;
        if !self.eat(Keyword::Temporary) {
            self.eat_word("temp");
        }
        match self.kind() {
            TokenKind::Keyword(Keyword::Table) => self.create_table(start),
            TokenKind::Keyword(Keyword::Unique | Keyword::Index) => self.create_index(start),
            TokenKind::Keyword(Keyword::Type) => self.create_type(start),
            _ => Ok(self.unknown(start)),
        }
    }

    fn create_table(&mut self, start: usize) -> PResult<Statement> {
        self.expect(Keyword::Table)?;
        let if_not_exists = self.if_not_exists()?;
        let name = self.qualified_name("table name")?;
        if *self.kind() != TokenKind::LParen {
            // CREATE TABLE ... AS SELECT, PARTITION OF, LIKE
            return Ok(self.unknown(start));
        }
        self.advance();

        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        if !self.eat_kind(&TokenKind::RParen) {
            loop {
                match self.table_constraint()? {
                    Some(constraint) => constraints.push(constraint),
                    None => columns.push(self.column_def()?),
                }
                match self.kind() {
                    TokenKind::Comma => {
                        self.advance();
                    }
                    TokenKind::RParen => {
                        self.advance();
                        break;
                    }
                    _ => return Err(self.expected("',' or ')'")),
                }
            }
        }
        let position = self.position_since(start);
        // Table options: ENGINE=..., WITH (...), ...
        self.skip_to_statement_end();

        Ok(Statement::CreateTable(CreateTable {
            if_not_exists,
            name,
            columns,
            constraints,
            position,
        }))
    }

    /// `KEY name (a)` vs a column named `key`.
    fn looks_like_index(&self) -> bool {
        let (a, b, c) = (self.peek_kind(1), self.peek_kind(2), self.peek_kind(3));
        (*a == TokenKind::LParen && is_identifier_like(b))
            || (is_identifier_like(a) && *b == TokenKind::LParen && is_identifier_like(c))
    }

    fn optional_index_name(&mut self) -> PResult<Option<Identifier>> {
        if *self.kind() == TokenKind::LParen {
            Ok(None)
        } else {
            Ok(Some(self.ident("index name")?))
        }
    }

    /// A table-level constraint, or `None` when the element is a column.
    fn table_constraint(&mut self) -> PResult<Option<TableConstraint>> {
        let start = self.pos;
        let mut name = if self.eat(Keyword::Constraint) {
            Some(self.ident("constraint name")?)
        } else {
            None
        };
        let kind = match self.kind().clone() {
            TokenKind::Keyword(Keyword::Primary) => {
                self.advance();
                self.expect(Keyword::Key)?;
                TableConstraintKind::PrimaryKey(self.ident_list()?)
            }
            TokenKind::Keyword(Keyword::Unique) => {
                self.advance();
                if !self.eat(Keyword::Key) {
                    self.eat(Keyword::Index);
                }
                let index_name = self.optional_index_name()?;
                name = name.or(index_name);
                TableConstraintKind::Unique(self.ident_list()?)
            }
            TokenKind::Keyword(Keyword::Foreign) => {
                self.advance();
                self.expect(Keyword::Key)?;
                let index_name = self.optional_index_name()?;
                name = name.or(index_name);
                let columns = self.ident_list()?;
                let reference = self.references()?;
                TableConstraintKind::ForeignKey { columns, reference }
            }
            TokenKind::Keyword(Keyword::Check) => {
                self.advance();
                TableConstraintKind::Check(self.parenthesized()?)
            }
            TokenKind::Keyword(Keyword::Key | Keyword::Index) if name.is_none() && self.looks_like_index() => {
                self.advance();
                name = self.optional_index_name()?;
                TableConstraintKind::Index(self.ident_list()?)
            }
            ref k
                if (is_word(k, "fulltext") || is_word(k, "spatial"))
                    && matches!(self.peek_kind(1), TokenKind::Keyword(Keyword::Key | Keyword::Index)) =>
            {
                self.advance();
                self.advance();
                name = self.optional_index_name()?;
                TableConstraintKind::Index(self.ident_list()?)
            }
            _ if name.is_some() => return Err(self.expected("constraint")),
            _ => return Ok(None),
        };
        Ok(Some(TableConstraint {
            name,
            kind,
            position: self.position_since(start),
        }))
    }

    fn column_def(&mut self) -> PResult<ColumnDef> {
        let start = self.pos;
        let name = self.ident("column name")?;
        let data_type = self.data_type()?;
        let mut constraints = Vec::new();
        while !matches!(
            self.kind(),
            TokenKind::Comma | TokenKind::RParen | TokenKind::Semicolon | TokenKind::Eof
        ) {
            if let Some(constraint) = self.column_constraint()? {
                constraints.push(constraint);
            }
        }
        Ok(ColumnDef {
            name,
            data_type,
            constraints,
            position: self.position_since(start),
        })
    }

    fn data_type(&mut self) -> PResult<DataType> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            let kind = self.kind();
            match kind {
                TokenKind::Eof | TokenKind::Semicolon => break,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                TokenKind::Comma if depth == 0 => break,
                k if depth == 0 && self.pos > start && starts_column_constraint(k) => break,
                k if depth == 0
                    && (is_word(k, "collate")
                        || is_word(k, "charset")
                        || (is_word(k, "character") && self.peek_kind(1).clone() == TokenKind::Keyword(Keyword::Set))) =>
                {
                    break;
                }
                _ => {}
            }
            self.advance();
        }
        if start == self.pos {
            return Err(self.expected("data type"));
        }
        let tokens = &self.tokens[start..self.pos];
        Ok(DataType {
            text: render_tokens(tokens, false),
            position: Position::merge(tokens.iter().map(|t| &t.position)),
        })
    }

    /// One column constraint, or `None` after skipping a token the grammar
    /// does not model (COLLATE, CHARACTER SET, ...).
    fn column_constraint(&mut self) -> PResult<Option<ColumnConstraint>> {
        let start = self.pos;
        let name = if self.eat(Keyword::Constraint) {
            Some(self.ident("constraint name")?)
        } else {
            None
        };
        let kind = match self.kind().clone() {
            TokenKind::Keyword(Keyword::Not) => {
                self.advance();
                self.expect(Keyword::Null)?;
                ColumnConstraintKind::NotNull
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                ColumnConstraintKind::Null
            }
            TokenKind::Keyword(Keyword::Primary) => {
                self.advance();
                self.expect(Keyword::Key)?;
                if !self.eat(Keyword::Asc) {
                    self.eat(Keyword::Desc);
                }
                ColumnConstraintKind::PrimaryKey
            }
            TokenKind::Keyword(Keyword::Unique) => {
                self.advance();
                self.eat(Keyword::Key);
                ColumnConstraintKind::Unique
            }
            TokenKind::Keyword(Keyword::AutoIncrement) => {
                self.advance();
                ColumnConstraintKind::AutoIncrement
            }
            ref k if is_word(k, "autoincrement") => {
                self.advance();
                ColumnConstraintKind::AutoIncrement
            }
            TokenKind::Keyword(Keyword::Default) => {
                self.advance();
                ColumnConstraintKind::Default(self.default_value()?)
            }
            TokenKind::Keyword(Keyword::Check) => {
                self.advance();
                ColumnConstraintKind::Check(self.parenthesized()?)
            }
            TokenKind::Keyword(Keyword::References) => ColumnConstraintKind::References(self.references()?),
            TokenKind::Keyword(Keyword::Generated) => {
                self.advance();
                if self.eat(Keyword::By) {
                    self.expect(Keyword::Default)?;
                } else {
                    self.expect(Keyword::Always)?;
                }
                self.expect(Keyword::As)?;
                if self.eat_word("identity") {
                    if *self.kind() == TokenKind::LParen {
                        self.skip_group();
                    }
                    ColumnConstraintKind::AutoIncrement
                } else {
                    let expression = self.parenthesized()?;
                    if !self.eat(Keyword::Stored) {
                        self.eat_word("virtual");
                    }
                    ColumnConstraintKind::Generated(expression)
                }
            }
            TokenKind::Keyword(Keyword::As) => {
                self.advance();
                let expression = self.parenthesized()?;
                if !self.eat(Keyword::Stored) {
                    self.eat_word("virtual");
                }
                ColumnConstraintKind::Generated(expression)
            }
            TokenKind::Keyword(Keyword::Comment) => {
                self.advance();
                match self.kind().clone() {
                    TokenKind::Str(text) => {
                        self.advance();
                        ColumnConstraintKind::Comment(text)
                    }
                    _ => return Err(self.expected("comment string")),
                }
            }
            TokenKind::Keyword(Keyword::On) => {
                // MySQL: ON UPDATE CURRENT_TIMESTAMP
                self.advance();
                self.advance();
                self.expression_range(|k| starts_column_constraint(k) || *k == TokenKind::Comma);
                return Ok(None);
            }
            _ if name.is_some() => return Err(self.expected("constraint")),
            _ => {
                self.advance();
                return Ok(None);
            }
        };
        Ok(Some(ColumnConstraint {
            name,
            kind,
            position: self.position_since(start),
        }))
    }

    fn default_value(&mut self) -> PResult<Expression> {
        if self.at(Keyword::Null) {
            let token = self.advance();
            return Ok(Expression::from_tokens(std::slice::from_ref(&token)));
        }
        self.expression_until(
            |k| starts_column_constraint(k) || *k == TokenKind::Comma,
            "default value",
        )
    }

    fn references(&mut self) -> PResult<ForeignKeyRef> {
        self.expect(Keyword::References)?;
        let table = self.qualified_name("referenced table")?;
        let columns = if *self.kind() == TokenKind::LParen {
            self.ident_list()?
        } else {
            Vec::new()
        };
        let mut on_delete = None;
        let mut on_update = None;
        loop {
            if self.at(Keyword::On) && *self.peek_kind(1) == TokenKind::Keyword(Keyword::Delete) {
                self.advance();
                self.advance();
                on_delete = Some(self.referential_action()?);
            } else if self.at(Keyword::On) && *self.peek_kind(1) == TokenKind::Keyword(Keyword::Update) {
                self.advance();
                self.advance();
                on_update = Some(self.referential_action()?);
            } else if self.eat_word("match") || self.eat_word("initially") {
                self.advance();
            } else if self.eat_word("deferrable") {
            } else if self.at(Keyword::Not) && is_word(self.peek_kind(1), "deferrable") {
                self.advance();
                self.advance();
            } else {
                break;
            }
        }
        Ok(ForeignKeyRef {
            table,
            columns,
            on_delete,
            on_update,
        })
    }

    fn referential_action(&mut self) -> PResult<String> {
        let action = match self.kind() {
            TokenKind::Keyword(Keyword::Cascade) => "cascade",
            TokenKind::Keyword(Keyword::Restrict) => "restrict",
            TokenKind::Keyword(Keyword::Set) => match self.peek_kind(1) {
                TokenKind::Keyword(Keyword::Null) => "set null",
                TokenKind::Keyword(Keyword::Default) => "set default",
                _ => return Err(self.expected("referential action")),
            },
            TokenKind::Keyword(Keyword::No) => "no action",
            _ => return Err(self.expected("referential action")),
        };
        self.advance();
        if action.contains(' ') {
            self.advance();
        }
        Ok(action.to_string())
    }

    fn create_index(&mut self, start: usize) -> PResult<Statement> {
        let unique = self.eat(Keyword::Unique);
        self.expect(Keyword::Index)?;
        self.eat_word("concurrently");
        self.if_not_exists()?;
        let name = if self.at(Keyword::On) {
            None
        } else {
            Some(self.ident("index name")?)
        };
        self.expect(Keyword::On)?;
        self.eat(Keyword::Only);
        let table = self.qualified_name("table name")?;
        if self.eat(Keyword::Using) {
            self.advance();
        }

        self.expect_kind(TokenKind::LParen, "'('")?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.expression_until(
                |k| {
                    matches!(k, TokenKind::Comma | TokenKind::Keyword(Keyword::Asc | Keyword::Desc))
                        || is_word(k, "nulls")
                },
                "index column",
            )?);
            if !self.eat(Keyword::Asc) {
                self.eat(Keyword::Desc);
            }
            if self.eat_word("nulls") {
                self.advance();
            }
            if !self.eat_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen, "')'")?;
        if self.eat_word("include") && *self.kind() == TokenKind::LParen {
            self.skip_group();
        }
        let predicate = if self.eat(Keyword::Where) {
            Some(self.expression_until(|_| false, "index predicate")?)
        } else {
            None
        };

        Ok(Statement::CreateIndex(CreateIndex {
            unique,
            name,
            table,
            columns,
            predicate,
            position: self.position_since(start),
        }))
    }

    fn create_type(&mut self, start: usize) -> PResult<Statement> {
        self.expect(Keyword::Type)?;
        let name = self.qualified_name("type name")?;
        let definition = if matches!(self.kind(), TokenKind::Semicolon | TokenKind::Eof) {
            TypeDefinition::Shell
        } else if !self.eat(Keyword::As) {
            return Ok(self.unknown(start));
        } else if self.eat(Keyword::Enum) {
            self.expect_kind(TokenKind::LParen, "'('")?;
            let mut values = Vec::new();
            while let TokenKind::Str(value) = self.kind().clone() {
                self.advance();
                values.push(value);
                if !self.eat_kind(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_kind(TokenKind::RParen, "')'")?;
            TypeDefinition::Enum(values)
        } else if self.eat_kind(&TokenKind::LParen) {
            let mut columns = Vec::new();
            while *self.kind() != TokenKind::RParen {
                columns.push(self.column_def()?);
                if !self.eat_kind(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_kind(TokenKind::RParen, "')'")?;
            TypeDefinition::Composite(columns)
        } else {
            // AS RANGE, AS BASE, ...
            return Ok(self.unknown(start));
        };
        Ok(Statement::CreateType(CreateType {
            name,
            definition,
            position: self.position_since(start),
        }))
    }

    // ALTER / COMMENT / UPDATE

    fn alter_table(&mut self) -> PResult<Statement> {
        let start = self.pos;
        self.expect(Keyword::Alter)?;
        self.expect(Keyword::Table)?;
        if self.eat(Keyword::If) {
            self.expect(Keyword::Exists)?;
        }
        self.eat(Keyword::Only);
        let table = self.qualified_name("table name")?;

        let mut actions = Vec::new();
        loop {
            let action_start = self.pos;
            if self.eat(Keyword::Add) {
                match self.table_constraint()? {
                    Some(constraint) => actions.push(AlterAction::AddConstraint(constraint)),
                    None => {
                        self.eat(Keyword::Column);
                        self.if_not_exists()?;
                        actions.push(AlterAction::AddColumn(self.column_def()?));
                    }
                }
            } else {
                let (begin, end) = self.expression_range(|k| *k == TokenKind::Comma);
                if begin == end {
                    return Err(self.expected("ALTER TABLE action"));
                }
                actions.push(AlterAction::Other {
                    text: render_tokens(&self.tokens[begin..end], false),
                    position: self.position_since(action_start),
                });
            }
            if !self.eat_kind(&TokenKind::Comma) {
                break;
            }
        }

        Ok(Statement::AlterTable(AlterTable {
            table,
            actions,
            position: self.position_since(start),
        }))
    }

    fn comment_on(&mut self, start: usize) -> PResult<Statement> {
        self.expect(Keyword::Comment)?;
        self.expect(Keyword::On)?;
        let target = if self.eat(Keyword::Table) {
            CommentTarget::Table(self.qualified_name("table name")?)
        } else if self.eat(Keyword::Column) {
            CommentTarget::Column(self.qualified_name("column name")?)
        } else {
            return Ok(self.unknown(start));
        };
        self.expect(Keyword::Is)?;
        let text = match self.kind().clone() {
            TokenKind::Str(text) => Some(text),
            TokenKind::Keyword(Keyword::Null) => None,
            _ => return Err(self.expected("comment string")),
        };
        self.advance();
        Ok(Statement::CommentOn(CommentOn {
            target,
            text,
            position: self.position_since(start),
        }))
    }

    fn update(&mut self) -> PResult<Statement> {
        let start = self.pos;
        self.expect(Keyword::Update)?;
        self.eat(Keyword::Only);
        let table = self.table_ref()?;
        self.expect(Keyword::Set)?;

        let mut assignments = Vec::new();
        loop {
            let target = self.qualified_name("column name")?;
            let column = target.parts.last().cloned().ok_or_else(|| self.expected("column name"))?;
            self.expect_kind(TokenKind::Op("=".to_string()), "'='")?;
            let value = self.expression_until(
                |k| matches!(k, TokenKind::Comma | TokenKind::Keyword(Keyword::Where | Keyword::From)) || is_word(k, "returning"),
                "value",
            )?;
            assignments.push(Assignment { column, value });
            if !self.eat_kind(&TokenKind::Comma) {
                break;
            }
        }
        if self.eat(Keyword::From) {
            self.expression_range(|k| *k == TokenKind::Keyword(Keyword::Where));
        }
        let where_clause = if self.eat(Keyword::Where) {
            Some(self.expression_until(|k| is_word(k, "returning"), "condition")?)
        } else {
            None
        };
        let position = self.position_since(start);
        // RETURNING ...
        self.skip_to_statement_end();

        Ok(Statement::Update(UpdateStatement {
            table,
            assignments,
            where_clause,
            position,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Location;

    fn parse_ok(sql: &str) -> Vec<Statement> {
        let result = parse_statements(sql);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        result.into_value().unwrap_or_default()
    }

    fn single(sql: &str) -> Statement {
        let mut statements = parse_ok(sql);
        assert_eq!(statements.len(), 1);
        statements.remove(0)
    }

    #[test]
    fn test_create_table_columns_and_constraints() {
        let Statement::CreateTable(table) = single(
            "CREATE TABLE IF NOT EXISTS public.posts (
                id SERIAL PRIMARY KEY,
                title VARCHAR(255) NOT NULL DEFAULT 'untitled',
                author_id INT REFERENCES users(id) ON DELETE CASCADE,
                price numeric(10, 2) CHECK (price > 0),
                CONSTRAINT posts_title_uk UNIQUE (title)
            );",
        ) else {
            panic!("expected CREATE TABLE");
        };
        assert!(table.if_not_exists);
        assert_eq!(table.name.to_string(), "public.posts");
        assert_eq!(table.columns.len(), 4);
        assert_eq!(table.columns[1].data_type.text, "VARCHAR(255)");
        assert!(table.columns[1].has(|c| matches!(c, ColumnConstraintKind::NotNull)));
        assert!(table.columns[1].has(|c| matches!(c, ColumnConstraintKind::Default(e) if e.text == "'untitled'")));
        assert!(table.columns[2].has(|c| matches!(
            c,
            ColumnConstraintKind::References(r) if r.table.last() == "users" && r.on_delete.as_deref() == Some("cascade")
        )));
        assert_eq!(table.columns[3].data_type.text, "numeric(10, 2)");
        assert_eq!(table.constraints.len(), 1);
        assert_eq!(table.constraints[0].name.as_ref().map(|n| n.value.as_str()), Some("posts_title_uk"));
    }

    #[test]
    fn test_mysql_table_with_keys_and_options() {
        let Statement::CreateTable(table) = single(
            "CREATE TABLE `orders` (
                `id` int unsigned NOT NULL AUTO_INCREMENT,
                `key` varchar(10) CHARACTER SET utf8 COLLATE utf8_bin DEFAULT NULL,
                PRIMARY KEY (`id`),
                KEY `orders_key_idx` (`key`(5))
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8;",
        ) else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[0].data_type.text, "int unsigned");
        assert_eq!(table.columns[1].name.value, "key");
        assert_eq!(table.columns[1].data_type.text, "varchar(10)");
        assert!(matches!(&table.constraints[1].kind, TableConstraintKind::Index(cols) if cols[0].value == "key"));
    }

    #[test]
    fn test_select_with_joins_and_aliases() {
        let Statement::Select(select) = single(
            "SELECT u.id, u.name AS author, count(p.id) total, p.*
             FROM users u
             LEFT OUTER JOIN posts AS p ON p.author_id = u.id
             WHERE u.active = true
             GROUP BY u.id, u.name
             ORDER BY total DESC
             LIMIT 10;",
        ) else {
            panic!("expected SELECT");
        };
        assert_eq!(select.fields.len(), 4);
        match &select.fields[0] {
            SelectField::Expr { scope, name, .. } => {
                assert_eq!(scope.as_ref().map(|s| s.value.as_str()), Some("u"));
                assert_eq!(name, "id");
            }
            other => panic!("unexpected {:?}", other),
        }
        match &select.fields[2] {
            SelectField::Expr { name, expression, .. } => {
                assert_eq!(name, "total");
                assert_eq!(expression.text, "count(p.id)");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&select.fields[3], SelectField::Wildcard { scope: Some(s), .. } if s.value == "p"));
        assert_eq!(select.tables[0].reference_name(), "u");
        assert_eq!(select.joins[0].kind, JoinKind::Left);
        assert_eq!(select.joins[0].table.reference_name(), "p");
        assert_eq!(select.group_by.len(), 2);
        assert!(select.order_by[0].descending);
        assert_eq!(select.limit.as_ref().map(|l| l.text.as_str()), Some("10"));
    }

    #[test]
    fn test_missing_from_is_an_error_at_the_expected_position() {
        let result = parse_statements("SELECT id;");
        assert!(result.value().is_none());
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::UnexpectedToken);
        assert_eq!(errors[0].position.start, Location::new(1, 10));
        assert!(errors[0].message.contains("FROM"));
    }

    #[test]
    fn test_recovers_after_bad_statement() {
        let result = parse_statements("CREATE TABLE (id int);\nCREATE TABLE ok (id int);");
        assert_eq!(result.errors().count(), 1);
        let statements = result.into_value().unwrap_or_default();
        assert_eq!(statements.len(), 1);
        assert!(matches!(&statements[0], Statement::CreateTable(t) if t.name.last() == "ok"));
    }

    #[test]
    fn test_alter_table_add_constraint_and_column() {
        let Statement::AlterTable(alter) = single(
            "ALTER TABLE ONLY public.posts
                ADD CONSTRAINT posts_author_fk FOREIGN KEY (author_id) REFERENCES public.users(id) ON UPDATE SET NULL,
                ADD COLUMN slug text,
                OWNER TO admin;",
        ) else {
            panic!("expected ALTER TABLE");
        };
        assert_eq!(alter.actions.len(), 3);
        assert!(matches!(
            &alter.actions[0],
            AlterAction::AddConstraint(TableConstraint { kind: TableConstraintKind::ForeignKey { reference, .. }, .. })
                if reference.on_update.as_deref() == Some("set null")
        ));
        assert!(matches!(&alter.actions[1], AlterAction::AddColumn(c) if c.name.value == "slug"));
        assert!(matches!(&alter.actions[2], AlterAction::Other { text, .. } if text == "OWNER TO admin"));
    }

    #[test]
    fn test_create_index_type_and_comment() {
        let statements = parse_ok(
            "CREATE UNIQUE INDEX users_email_idx ON users USING btree (lower(email)) WHERE deleted_at IS NULL;
             CREATE TYPE mood AS ENUM ('sad', 'ok', 'happy');
             CREATE TYPE point2 AS (x int, y int);
             COMMENT ON COLUMN users.email IS 'login';",
        );
        assert_eq!(statements.len(), 4);
        let Statement::CreateIndex(index) = &statements[0] else {
            panic!("expected CREATE INDEX");
        };
        assert!(index.unique);
        assert_eq!(index.columns[0].text, "lower(email)");
        assert_eq!(index.predicate.as_ref().map(|p| p.text.as_str()), Some("deleted_at IS NULL"));
        assert!(matches!(&statements[1], Statement::CreateType(t) if t.definition == TypeDefinition::Enum(vec!["sad".into(), "ok".into(), "happy".into()])));
        assert!(matches!(&statements[2], Statement::CreateType(CreateType { definition: TypeDefinition::Composite(cols), .. }) if cols.len() == 2));
        assert!(matches!(&statements[3], Statement::CommentOn(c) if c.text.as_deref() == Some("login")));
    }

    #[test]
    fn test_create_type_without_body_is_a_shell() {
        let statements = parse_ok("CREATE TYPE app.pending;\nCREATE TYPE r AS RANGE (subtype = float8);");
        assert_eq!(statements.len(), 2);
        let Statement::CreateType(shell) = &statements[0] else {
            panic!("expected CREATE TYPE");
        };
        assert_eq!(shell.definition, TypeDefinition::Shell);
        assert_eq!(shell.name.entity_ref().entity, "pending");
        assert!(!matches!(&statements[1], Statement::CreateType(_)));
    }

    #[test]
    fn test_update_and_unknown_statements() {
        let statements = parse_ok("UPDATE users u SET name = 'x', active = false WHERE u.id = 1 RETURNING id; INSERT INTO t VALUES (1);");
        let Statement::Update(update) = &statements[0] else {
            panic!("expected UPDATE");
        };
        assert_eq!(update.table.reference_name(), "u");
        assert_eq!(update.assignments.len(), 2);
        assert_eq!(update.where_clause.as_ref().map(|w| w.text.as_str()), Some("u.id = 1"));
        let Statement::Unknown(unknown) = &statements[1] else {
            panic!("expected unknown statement");
        };
        assert_eq!(unknown.text, "INSERT INTO t VALUES (1)");
        assert_eq!(unknown.command(), "INSERT");
    }
}
