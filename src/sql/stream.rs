//! Cursor over a token sequence.

use super::lexer::{Token, TokenKind};

/// A saved cursor position, see [`TokenStream::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    /// Wrap `tokens`. A trailing end-of-input token is appended if missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::EndOfInput) {
            let (line, column) = tokens
                .last()
                .map(|t| (t.line, t.column))
                .unwrap_or((1, 1));
            tokens.push(Token {
                kind: TokenKind::EndOfInput,
                text: String::new(),
                line,
                column,
            });
        }
        Self { tokens, pos: 0 }
    }

    fn eof(&self) -> &Token {
        // new() guarantees a trailing end-of-input token
        &self.tokens[self.tokens.len() - 1]
    }

    pub fn peek(&self) -> &Token {
        self.look_ahead(0)
    }

    /// The token `n` positions past the current one; end-of-input when out of range.
    pub fn look_ahead(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or_else(|| self.eof())
    }

    /// Consume and return the current token. At the end the cursor stays put.
    pub fn next(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    /// Non-consuming check of the current token's kind and, optionally, text.
    pub fn is(&self, kind: TokenKind, value: Option<&str>) -> bool {
        let tok = self.peek();
        tok.kind == kind && value.is_none_or(|v| tok.text == v)
    }

    /// Consume the current token when it matches; report whether it did.
    pub fn eat(&mut self, kind: TokenKind, value: Option<&str>) -> bool {
        if self.is(kind, value) {
            self.next();
            true
        } else {
            false
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.is(TokenKind::Keyword, Some(word))
    }

    pub fn eat_keyword(&mut self, word: &str) -> bool {
        self.eat(TokenKind::Keyword, Some(word))
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.is(TokenKind::Punctuation, Some(p))
    }

    pub fn eat_punct(&mut self, p: &str) -> bool {
        self.eat(TokenKind::Punctuation, Some(p))
    }

    pub fn save(&self) -> Mark {
        Mark(self.pos)
    }

    pub fn restore(&mut self, mark: Mark) {
        self.pos = mark.0.min(self.tokens.len() - 1);
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EndOfInput
    }

    pub fn current_line(&self) -> usize {
        self.peek().line
    }
}
