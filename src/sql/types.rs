//! Column type text assembly.
//!
//! Types are kept verbatim rather than mapped to a canonical set: the
//! diagram shows what the schema author wrote, lowercased and with
//! whitespace normalized (`character varying(255)`, `numeric(10,2)`,
//! `varchar(5)[]`).

use super::lexer::{Token, TokenKind};

/// Keywords that may continue a multi-word type name.
const CONTINUATION_KEYWORDS: &[&str] = &["WITH", "WITHOUT", "TIME", "ZONE", "VARYING", "PRECISION"];

/// True when `tok` can extend a type already started, e.g. the `VARYING` of
/// `character varying` or the `WITH TIME ZONE` of a timestamp.
pub fn is_type_continuation(tok: &Token) -> bool {
    tok.kind == TokenKind::Keyword && CONTINUATION_KEYWORDS.contains(&tok.text.as_str())
}

/// Text a token contributes to a type name.
pub fn type_word(tok: &Token) -> String {
    match tok.kind {
        TokenKind::QuotedIdentifier => tok.text.clone(),
        _ => tok.text.to_lowercase(),
    }
}

/// Incrementally built type expression.
#[derive(Debug, Default)]
pub struct TypeText {
    text: String,
}

impl TypeText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a word, separated by a single space from a preceding word.
    pub fn push_word(&mut self, word: &str) {
        if !self.text.is_empty() && !self.text.ends_with('.') {
            self.text.push(' ');
        }
        self.text.push_str(word);
    }

    /// Append a schema qualifier separator (`my_schema.my_type`).
    pub fn push_dot(&mut self) {
        self.text.push('.');
    }

    /// Append a parenthesized argument list such as `(10,2)`.
    pub fn push_args(&mut self, args: &[String]) {
        self.text.push('(');
        self.text.push_str(&args.join(","));
        self.text.push(')');
    }

    /// Append an array suffix, `[]` or `[n]`.
    pub fn push_array(&mut self, size: Option<&str>) {
        self.text.push('[');
        if let Some(size) = size {
            self.text.push_str(size);
        }
        self.text.push(']');
    }

    pub fn finish(self) -> String {
        self.text
    }
}
