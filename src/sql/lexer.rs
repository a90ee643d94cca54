//! SQL lexer: raw text to positioned tokens.

use crate::diagnostic::{Diagnostic, DiagnosticKind, Location, Position, Span};
use std::iter::Peekable;
use std::str::CharIndices;

macro_rules! keywords {
    ($($variant:ident => $text:literal),* $(,)?) => {
        /// SQL keywords the grammar cares about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant),*
        }

        impl Keyword {
            pub fn from_str(s: &str) -> Option<Self> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),*
                }
            }
        }
    };
}

keywords! {
    Select => "SELECT",
    Distinct => "DISTINCT",
    All => "ALL",
    From => "FROM",
    Where => "WHERE",
    Group => "GROUP",
    By => "BY",
    Having => "HAVING",
    Order => "ORDER",
    Asc => "ASC",
    Desc => "DESC",
    Limit => "LIMIT",
    Offset => "OFFSET",
    Join => "JOIN",
    Inner => "INNER",
    Left => "LEFT",
    Right => "RIGHT",
    Full => "FULL",
    Outer => "OUTER",
    Cross => "CROSS",
    On => "ON",
    Using => "USING",
    As => "AS",
    And => "AND",
    Or => "OR",
    Not => "NOT",
    Null => "NULL",
    Is => "IS",
    In => "IN",
    Like => "LIKE",
    Between => "BETWEEN",
    Exists => "EXISTS",
    Case => "CASE",
    When => "WHEN",
    Then => "THEN",
    Else => "ELSE",
    End => "END",
    Union => "UNION",
    Create => "CREATE",
    Alter => "ALTER",
    Drop => "DROP",
    Add => "ADD",
    Column => "COLUMN",
    Table => "TABLE",
    Only => "ONLY",
    If => "IF",
    Primary => "PRIMARY",
    Key => "KEY",
    Foreign => "FOREIGN",
    References => "REFERENCES",
    Unique => "UNIQUE",
    Default => "DEFAULT",
    Constraint => "CONSTRAINT",
    Index => "INDEX",
    Check => "CHECK",
    Delete => "DELETE",
    Update => "UPDATE",
    Set => "SET",
    Insert => "INSERT",
    Into => "INTO",
    Values => "VALUES",
    Cascade => "CASCADE",
    Restrict => "RESTRICT",
    No => "NO",
    Action => "ACTION",
    Comment => "COMMENT",
    Type => "TYPE",
    Enum => "ENUM",
    Generated => "GENERATED",
    Always => "ALWAYS",
    Stored => "STORED",
    AutoIncrement => "AUTO_INCREMENT",
    Temporary => "TEMPORARY",
}

impl Keyword {
    /// Reserved keywords never stand for identifiers.
    pub fn is_reserved(&self) -> bool {
        !matches!(
            self,
            Self::Key
                | Self::No
                | Self::Action
                | Self::Comment
                | Self::Type
                | Self::Enum
                | Self::Column
                | Self::Index
                | Self::Always
                | Self::Stored
                | Self::Generated
                | Self::Cascade
                | Self::Restrict
                | Self::Temporary
                | Self::Only
                | Self::Asc
                | Self::Desc
                | Self::Offset
                | Self::Limit
                | Self::Add
                | Self::Delete
                | Self::Update
                | Self::Insert
                | Self::Values
                | Self::If
                | Self::AutoIncrement
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Ident(String),
    QuotedIdent(String),
    Str(String),
    Num(String),
    /// Operators: `=`, `<>`, `::`, `||`, ...
    Op(String),

    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    Star,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token, quotes included.
    pub text: String,
    pub position: Position,
}

impl Token {
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}

/// SQL lexer.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            diagnostics: Vec::new(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn position_from(&mut self, start: usize, start_loc: Location) -> Position {
        let end = self.offset();
        Position::new(Span { start, end }, start_loc, self.location())
    }

    fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, position: Position) {
        self.diagnostics.push(Diagnostic::error(kind, message, position));
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('-') if self.peek_second() == Some('-') => self.skip_line_comment(),
                Some('#') => self.skip_line_comment(),
                Some('/') if self.peek_second() == Some('*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let start = self.offset();
        let start_loc = self.location();
        self.advance(); // /
        self.advance(); // *
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return;
                }
                Some(_) => {}
                None => {
                    let position = self.position_from(start, start_loc);
                    self.error(DiagnosticKind::UnterminatedLiteral, "Unterminated block comment", position);
                    return;
                }
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    /// Reads a quoted run where the closing quote can be escaped by doubling.
    /// Returns `None` when the input ends first.
    fn read_quoted(&mut self, close: char, backslash_escapes: bool) -> Option<String> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.advance()? {
                c if c == close => {
                    if self.peek() == Some(close) {
                        s.push(close);
                        self.advance();
                    } else {
                        return Some(s);
                    }
                }
                '\\' if backslash_escapes => match self.advance()? {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    'r' => s.push('\r'),
                    c => s.push(c),
                },
                c => s.push(c),
            }
        }
    }

    /// PostgreSQL `$tag$ ... $tag$` strings.
    fn read_dollar_quoted(&mut self) -> Option<String> {
        let mut tag = String::from("$");
        self.advance();
        while let Some(c) = self.peek() {
            self.advance();
            tag.push(c);
            if c == '$' {
                break;
            }
        }
        let rest_start = self.offset();
        let rest = &self.input[rest_start..];
        let end = rest.find(&tag)?;
        let body = rest[..end].to_string();
        for _ in body.chars().chain(tag.chars()) {
            self.advance();
        }
        Some(body)
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        let mut has_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance();
            } else if c == '.' && !has_dot && self.peek_second().is_some_and(|n| n.is_ascii_digit()) {
                has_dot = true;
                num.push(c);
                self.advance();
            } else {
                break;
            }
        }
        num
    }

    fn read_operator(&mut self, first: char) -> String {
        self.advance();
        let mut op = String::from(first);
        if let Some(next) = self.peek() {
            let pair = matches!(
                (first, next),
                ('<', '=') | ('>', '=') | ('<', '>') | ('!', '=') | ('|', '|') | (':', ':')
            );
            if pair {
                op.push(next);
                self.advance();
            }
        }
        op
    }

    /// Next token, or `None` at end of input. Unknown characters are
    /// reported and skipped.
    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace_and_comments();
            let start = self.offset();
            let start_loc = self.location();
            let c = self.peek()?;

            let kind = match c {
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                ';' => {
                    self.advance();
                    TokenKind::Semicolon
                }
                '.' if !self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                    self.advance();
                    TokenKind::Dot
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '"' | '`' => match self.read_quoted(c, false) {
                    Some(ident) => TokenKind::QuotedIdent(ident),
                    None => {
                        let position = self.position_from(start, start_loc);
                        self.error(DiagnosticKind::UnterminatedLiteral, "Unterminated quoted identifier", position);
                        continue;
                    }
                },
                '[' => match self.read_quoted(']', false) {
                    Some(ident) => TokenKind::QuotedIdent(ident),
                    None => {
                        let position = self.position_from(start, start_loc);
                        self.error(DiagnosticKind::UnterminatedLiteral, "Unterminated bracket identifier", position);
                        continue;
                    }
                },
                '\'' => match self.read_quoted('\'', true) {
                    Some(s) => TokenKind::Str(s),
                    None => {
                        let position = self.position_from(start, start_loc);
                        self.error(DiagnosticKind::UnterminatedLiteral, "Unterminated string", position);
                        continue;
                    }
                },
                '$' if self.peek_second().is_some_and(|n| n == '$' || n.is_alphabetic()) => {
                    match self.read_dollar_quoted() {
                        Some(s) => TokenKind::Str(s),
                        None => {
                            // Consume the rest so lexing stops at a known place.
                            while self.advance().is_some() {}
                            let position = self.position_from(start, start_loc);
                            self.error(DiagnosticKind::UnterminatedLiteral, "Unterminated dollar-quoted string", position);
                            continue;
                        }
                    }
                }
                c if c.is_ascii_digit() || c == '.' => TokenKind::Num(self.read_number()),
                c if c.is_alphabetic() || c == '_' => {
                    let ident = self.read_identifier();
                    match Keyword::from_str(&ident) {
                        Some(keyword) => TokenKind::Keyword(keyword),
                        None => TokenKind::Ident(ident),
                    }
                }
                '=' | '<' | '>' | '!' | '|' | ':' | '+' | '-' | '/' | '%' | '^' | '~' | '&' | '?' | '@' | '$' => {
                    TokenKind::Op(self.read_operator(c))
                }
                _ => {
                    self.advance();
                    let position = self.position_from(start, start_loc);
                    self.error(DiagnosticKind::InvalidSyntax, format!("Unexpected character: {:?}", c), position);
                    continue;
                }
            };

            let position = self.position_from(start, start_loc);
            let text = self.input[start..position.offset.end].to_string();
            return Some(Token { kind, text, position });
        }
    }

    /// Collect all tokens, ending with `Eof`, plus lexing diagnostics.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        let end = self.input.len();
        let loc = self.location();
        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            position: Position::new(Span { start: end, end }, loc, loc),
        });
        (tokens, self.diagnostics)
    }
}
