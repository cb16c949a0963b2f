//! Lexing in two levels
//!
//! [`Fragments`] splits raw source into literal text and `{% %}` / `{{ }}`
//! fragments, applying whitespace control as it goes. [`Tokenizer`] splits the
//! markup inside a fragment into expression tokens for the strict parser.

use crate::error::{Error, Result};
use crate::grammar::TEMPLATE_PARSER;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Text,
    Tag,
    Variable,
}

/// A span of source text tagged with the line it starts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub kind: FragmentKind,
    pub text: &'a str,
    pub line_number: usize,
}

impl<'a> Fragment<'a> {
    /// `{%-` or `{{-`
    fn trims_left(&self) -> bool {
        self.kind != FragmentKind::Text && self.text.len() > 2 && self.text[2..].starts_with('-')
    }

    /// `-%}` or `-}}`
    fn trims_right(&self) -> bool {
        self.kind != FragmentKind::Text
            && self.text.len() >= 5
            && (self.text.ends_with("%}") || self.text.ends_with("}}"))
            && self.text[..self.text.len() - 2].ends_with('-')
    }
}

/// Lazy stream of fragments; clone it to restart from the same point
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    source: &'a str,
    position: usize,
    line: usize,
    pending: Option<Fragment<'a>>,
    trim_next: bool,
}

impl<'a> Fragments<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
            line: 1,
            pending: None,
            trim_next: false,
        }
    }

    fn delimiter(&mut self, start: usize, end: usize) -> Fragment<'a> {
        let text = &self.source[start..end];
        let kind = if text.starts_with("{%") {
            FragmentKind::Tag
        } else {
            FragmentKind::Variable
        };
        let fragment = Fragment {
            kind,
            text,
            line_number: self.line,
        };
        self.line += count_newlines(text);
        self.position = end;
        fragment
    }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Fragment<'a>> {
        loop {
            if let Some(fragment) = self.pending.take() {
                self.trim_next = fragment.trims_right();
                return Some(fragment);
            }

            if self.position >= self.source.len() {
                return None;
            }

            let found = TEMPLATE_PARSER
                .find_at(self.source, self.position)
                .map(|m| (m.start(), m.end()));

            let text_end = match found {
                Some((start, _)) => start,
                None => self.source.len(),
            };

            if text_end == self.position {
                // Delimiter directly at the cursor
                if let Some((start, end)) = found {
                    let fragment = self.delimiter(start, end);
                    self.trim_next = fragment.trims_right();
                    return Some(fragment);
                }
            }

            let line_number = self.line;
            let mut text = &self.source[self.position..text_end];
            self.line += count_newlines(text);
            self.position = text_end;

            if let Some((start, end)) = found {
                let next = self.delimiter(start, end);
                if next.trims_left() {
                    text = text.trim_end();
                }
                self.pending = Some(next);
            }
            if self.trim_next {
                text = text.trim_start();
                self.trim_next = false;
            }

            if !text.is_empty() {
                return Some(Fragment {
                    kind: FragmentKind::Text,
                    text,
                    line_number,
                });
            }
        }
    }
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

/// Expression token kinds, named as they appear in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Comparison,
    Str,
    Number,
    Id,
    DotDot,
    Pipe,
    Dot,
    Colon,
    Comma,
    OpenSquare,
    CloseSquare,
    OpenRound,
    CloseRound,
    Question,
    Dash,
    EndOfString,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Comparison => "comparison",
            TokenKind::Str => "string",
            TokenKind::Number => "number",
            TokenKind::Id => "id",
            TokenKind::DotDot => "dotdot",
            TokenKind::Pipe => "pipe",
            TokenKind::Dot => "dot",
            TokenKind::Colon => "colon",
            TokenKind::Comma => "comma",
            TokenKind::OpenSquare => "open_square",
            TokenKind::CloseSquare => "close_square",
            TokenKind::OpenRound => "open_round",
            TokenKind::CloseRound => "close_round",
            TokenKind::Question => "question",
            TokenKind::Dash => "dash",
            TokenKind::EndOfString => "end_of_string",
        }
    }

    fn special(c: char) -> Option<TokenKind> {
        match c {
            '|' => Some(TokenKind::Pipe),
            '.' => Some(TokenKind::Dot),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            '[' => Some(TokenKind::OpenSquare),
            ']' => Some(TokenKind::CloseSquare),
            '(' => Some(TokenKind::OpenRound),
            ')' => Some(TokenKind::CloseRound),
            '?' => Some(TokenKind::Question),
            '-' => Some(TokenKind::Dash),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::EndOfString => write!(f, "[:{}]", self.kind),
            _ => write!(f, "[:{}, {:?}]", self.kind, self.lexeme),
        }
    }
}

/// Tokenizer for the markup inside a fragment
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn rest_starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.position += 1;
            } else {
                break;
            }
        }
    }

    fn take(&mut self, len: usize) -> String {
        let end = (self.position + len).min(self.input.len());
        let s: String = self.input[self.position..end].iter().collect();
        self.position = end;
        s
    }

    fn is_ident_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_' || ch == '-' || ch == '?' || ch == '!'
    }

    fn comparison_len(&self) -> Option<usize> {
        for op in ["==", "!=", "<>", "<=", ">="] {
            if self.rest_starts_with(op) {
                return Some(2);
            }
        }
        if matches!(self.current_char(), Some('<') | Some('>')) {
            return Some(1);
        }
        if self.rest_starts_with("contains") && !self.peek(8).map_or(false, Self::is_ident_char) {
            return Some(8);
        }
        None
    }

    fn string_len(&self) -> Option<usize> {
        let quote = self.current_char()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let mut offset = 1;
        while let Some(ch) = self.peek(offset) {
            if ch == quote {
                return Some(offset + 1);
            }
            offset += 1;
        }
        None
    }

    fn number_len(&self) -> Option<usize> {
        let mut offset = 0;
        if self.peek(0) == Some('-') {
            offset = 1;
        }
        let digits_start = offset;
        while self.peek(offset).map_or(false, |c| c.is_ascii_digit()) {
            offset += 1;
        }
        if offset == digits_start {
            return None;
        }
        if self.peek(offset) == Some('.') && self.peek(offset + 1).map_or(false, |c| c.is_ascii_digit()) {
            offset += 1;
            while self.peek(offset).map_or(false, |c| c.is_ascii_digit()) {
                offset += 1;
            }
        }
        Some(offset)
    }

    fn identifier_len(&self) -> Option<usize> {
        let mut offset = 0;
        while self.peek(offset).map_or(false, Self::is_ident_char) {
            offset += 1;
        }
        if offset == 0 {
            None
        } else {
            Some(offset)
        }
    }

    /// Tokenize the whole input, ending with an `end_of_string` token
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let ch = match self.current_char() {
                Some(ch) => ch,
                None => break,
            };

            let token = if let Some(len) = self.comparison_len() {
                Token::new(TokenKind::Comparison, self.take(len))
            } else if let Some(len) = self.string_len() {
                Token::new(TokenKind::Str, self.take(len))
            } else if let Some(len) = self.number_len() {
                Token::new(TokenKind::Number, self.take(len))
            } else if let Some(len) = self.identifier_len() {
                Token::new(TokenKind::Id, self.take(len))
            } else if self.rest_starts_with("..") {
                Token::new(TokenKind::DotDot, self.take(2))
            } else if let Some(kind) = TokenKind::special(ch) {
                Token::new(kind, self.take(1))
            } else {
                return Err(Error::syntax(format!("Unexpected character {}", ch)));
            };

            tokens.push(token);
        }

        tokens.push(Token::new(TokenKind::EndOfString, ""));
        Ok(tokens)
    }
}
