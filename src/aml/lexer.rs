//! AML is line oriented: every physical line becomes a [`Line`] with its
//! indentation, whitespace-separated words, and the trailing `| note` and
//! `# comment` parts.

use crate::diagnostic::{Diagnostic, DiagnosticKind, Location, Position, Span};

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub position: Position,
}

impl Token {
    pub fn is(&self, keyword: &str) -> bool {
        self.text.eq_ignore_ascii_case(keyword)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// 1-based line number.
    pub number: usize,
    /// Leading whitespace width, a tab counting as two spaces.
    pub indent: usize,
    pub tokens: Vec<Token>,
    pub note: Option<Token>,
    pub comment: Option<Token>,
}

impl Line {
    /// No words, no note, no comment.
    pub fn is_blank(&self) -> bool {
        self.tokens.is_empty() && self.note.is_none() && self.comment.is_none()
    }

    /// Only a `#` comment.
    pub fn is_comment(&self) -> bool {
        self.tokens.is_empty() && self.note.is_none() && self.comment.is_some()
    }

    pub fn position(&self) -> Position {
        Position::merge(
            self.tokens
                .iter()
                .chain(self.note.iter())
                .chain(self.comment.iter())
                .map(|t| &t.position),
        )
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Line>, Vec<Diagnostic>) {
        let mut lines = Vec::new();
        let mut offset = 0;
        for (index, raw) in self.input.split('\n').enumerate() {
            let text = raw.strip_suffix('\r').unwrap_or(raw);
            lines.push(self.line(index + 1, offset, text));
            offset += raw.len() + 1;
        }
        (lines, self.diagnostics)
    }

    fn line(&mut self, number: usize, offset: usize, text: &str) -> Line {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let at = |i: usize| chars.get(i).map(|&(_, c)| c);
        let byte = |i: usize| chars.get(i).map_or(text.len(), |&(b, _)| b);
        let token = |start: usize, end: usize| {
            let (start_byte, end_byte) = (byte(start), byte(end));
            Token {
                text: text[start_byte..end_byte].to_string(),
                position: Position::new(
                    Span {
                        start: offset + start_byte,
                        end: offset + end_byte,
                    },
                    Location::new(number, start + 1),
                    Location::new(number, end + 1),
                ),
            }
        };

        let mut indent = 0;
        let mut i = 0;
        while let Some(c) = at(i) {
            match c {
                ' ' => indent += 1,
                '\t' => indent += 2,
                _ => break,
            }
            i += 1;
        }

        let mut line = Line {
            number,
            indent,
            tokens: Vec::new(),
            note: None,
            comment: None,
        };

        loop {
            while at(i).is_some_and(|c| c == ' ' || c == '\t') {
                i += 1;
            }
            let Some(c) = at(i) else { break };
            match c {
                '#' => {
                    line.comment = Some(trimmed(token(i + 1, chars.len())));
                    break;
                }
                '|' => {
                    // A note runs up to a ` #` comment.
                    let mut end = i + 1;
                    while let Some(c) = at(end) {
                        if c == '#' && at(end - 1).is_some_and(char::is_whitespace) {
                            break;
                        }
                        end += 1;
                    }
                    line.note = Some(trimmed(token(i + 1, end)));
                    i = end;
                }
                _ => {
                    let start = i;
                    let mut depth = 0usize;
                    while let Some(c) = at(i) {
                        match c {
                            '"' | '`' => match (i + 1..chars.len()).find(|&j| at(j) == Some(c)) {
                                Some(close) => i = close,
                                None => {
                                    let position = token(i, chars.len()).position;
                                    self.diagnostics.push(Diagnostic::error(
                                        DiagnosticKind::UnterminatedLiteral,
                                        format!("Unterminated {} quote", c),
                                        position,
                                    ));
                                    i = chars.len();
                                    break;
                                }
                            },
                            '(' => depth += 1,
                            ')' => depth = depth.saturating_sub(1),
                            ' ' | '\t' if depth == 0 => break,
                            _ => {}
                        }
                        i += 1;
                    }
                    let word = token(start, i);
                    if depth > 0 {
                        self.diagnostics.push(Diagnostic::error(
                            DiagnosticKind::InvalidSyntax,
                            "Unclosed parenthesis",
                            word.position,
                        ));
                    }
                    line.tokens.push(word);
                }
            }
        }
        line
    }
}

/// Drops surrounding whitespace from a note or comment token.
fn trimmed(token: Token) -> Token {
    let leading = token.text.len() - token.text.trim_start().len();
    let text = token.text.trim().to_string();
    let leading_chars = token.text[..leading].chars().count();
    let mut position = token.position;
    position.offset.start += leading;
    position.offset.end = position.offset.start + text.len();
    position.start.column += leading_chars;
    position.end.column = position.start.column + text.chars().count();
    Token { text, position }
}
