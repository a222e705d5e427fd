//! SQL tokenizer for DDL statements.
//!
//! The tokenizer is total: characters it does not understand are skipped
//! rather than reported, so any input produces a token stream ending in
//! [`TokenKind::EndOfInput`].

use serde::Serialize;
use std::iter::Peekable;
use std::str::Chars;

/// Words recognized as keywords. Everything else lexes as an identifier.
const KEYWORDS: &[&str] = &[
    "ACTION",
    "ADD",
    "ALTER",
    "CASCADE",
    "CHECK",
    "COLUMN",
    "CONSTRAINT",
    "CREATE",
    "DEFAULT",
    "DEFERRABLE",
    "DELETE",
    "EXCLUDE",
    "EXISTS",
    "FOREIGN",
    "IF",
    "INDEX",
    "KEY",
    "LIKE",
    "NO",
    "NOT",
    "NULL",
    "ON",
    "ONLY",
    "PRECISION",
    "PRIMARY",
    "REFERENCES",
    "RESTRICT",
    "SCHEMA",
    "SET",
    "TABLE",
    "TEMP",
    "TEMPORARY",
    "TIME",
    "UNIQUE",
    "UNLOGGED",
    "UPDATE",
    "VARYING",
    "VIEW",
    "WITH",
    "WITHOUT",
    "ZONE",
];

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '!', '+', '-', '*', '/', ':', '|'];
const COMPOUND_OPERATORS: &[&str] = &["<>", "<=", ">=", "!=", "::", "||"];
const PUNCTUATION: &[char] = &['(', ')', ',', ';', '.', '[', ']'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Keyword,
    Identifier,
    QuotedIdentifier,
    Number,
    String,
    Punctuation,
    Operator,
    EndOfInput,
}

/// A lexed token with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Uppercase for keywords, lowercase for unquoted identifiers, verbatim
    /// (unescaped) for quoted identifiers and strings.
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == p
    }
}

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.binary_search(&word).is_ok()
}

/// Tokenize `input`. Never fails.
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize()
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    current_char: Option<char>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.chars().peekable();
        let current_char = chars.next();
        Self {
            chars,
            current_char,
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self) {
        if self.current_char == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else if self.current_char.is_some() {
            self.column += 1;
        }
        self.current_char = self.chars.next();
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.current_char {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        // current_char is the opening '/'
        self.advance();
        self.advance();
        while let Some(c) = self.current_char {
            if c == '*' && self.peek() == Some(&'/') {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    /// Read a `quote`-delimited run where a doubled quote is a literal quote.
    fn read_quoted(&mut self, quote: char) -> String {
        self.advance(); // opening quote
        let mut s = String::new();
        while let Some(c) = self.current_char {
            if c == quote {
                if self.peek() == Some(&quote) {
                    s.push(c);
                    self.advance();
                    self.advance();
                } else {
                    self.advance(); // closing quote
                    break;
                }
            } else {
                s.push(c);
                self.advance();
            }
        }
        s
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.current_char {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        let mut has_dot = false;
        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance();
            } else if c == '.' && !has_dot {
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
        if let Some(second) = self.current_char {
            let pair: String = [first, second].iter().collect();
            if COMPOUND_OPERATORS.contains(&pair.as_str()) {
                self.advance();
                return pair;
            }
        }
        first.to_string()
    }

    fn keyword_or_ident(word: String) -> (TokenKind, String) {
        let upper = word.to_ascii_uppercase();
        if is_keyword(&upper) {
            (TokenKind::Keyword, upper)
        } else {
            (TokenKind::Identifier, word.to_ascii_lowercase())
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            let (line, column) = (self.line, self.column);
            let make = |kind, text| Token {
                kind,
                text,
                line,
                column,
            };

            let Some(c) = self.current_char else {
                return make(TokenKind::EndOfInput, String::new());
            };

            match c {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '-' if self.peek() == Some(&'-') => self.skip_line_comment(),
                '/' if self.peek() == Some(&'*') => self.skip_block_comment(),
                '"' => {
                    let ident = self.read_quoted('"');
                    return make(TokenKind::QuotedIdentifier, ident);
                }
                '\'' => {
                    let s = self.read_quoted('\'');
                    return make(TokenKind::String, s);
                }
                c if c.is_ascii_digit() => {
                    let num = self.read_number();
                    return make(TokenKind::Number, num);
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let word = self.read_identifier();
                    let (kind, text) = Self::keyword_or_ident(word);
                    return make(kind, text);
                }
                c if PUNCTUATION.contains(&c) => {
                    self.advance();
                    return make(TokenKind::Punctuation, c.to_string());
                }
                c if OPERATOR_CHARS.contains(&c) => {
                    let op = self.read_operator(c);
                    return make(TokenKind::Operator, op);
                }
                _ => {
                    // Skip unknown characters
                    self.advance();
                }
            }
        }
    }

    /// Collect all tokens, including the final end-of-input token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::EndOfInput;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds_and_text(sql: &str) -> Vec<(TokenKind, String)> {
        tokenize(sql).into_iter().map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn test_keywords_sorted_for_binary_search() {
        let mut sorted = KEYWORDS.to_vec();
        sorted.sort();
        assert_eq!(sorted, KEYWORDS);
    }

    #[test]
    fn test_simple_create_table() {
        let tokens = kinds_and_text("create Table Users (ID int);");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Keyword, "CREATE".to_string()),
                (TokenKind::Keyword, "TABLE".to_string()),
                (TokenKind::Identifier, "users".to_string()),
                (TokenKind::Punctuation, "(".to_string()),
                (TokenKind::Identifier, "id".to_string()),
                (TokenKind::Identifier, "int".to_string()),
                (TokenKind::Punctuation, ")".to_string()),
                (TokenKind::Punctuation, ";".to_string()),
                (TokenKind::EndOfInput, String::new()),
            ]
        );
    }

    #[test]
    fn test_quoted_identifier_keeps_case_and_unescapes() {
        let tokens = tokenize(r#""My ""Table""""#);
        assert_eq!(tokens[0].kind, TokenKind::QuotedIdentifier);
        assert_eq!(tokens[0].text, r#"My "Table""#);
    }

    #[test]
    fn test_string_literal_doubling() {
        let tokens = tokenize("'it''s -- not a comment'");
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "it's -- not a comment");
        assert_eq!(tokens[1].kind, TokenKind::EndOfInput);
    }

    #[test]
    fn test_comments_advance_lines() {
        let tokens = tokenize("-- one\n/* two\nthree */ create");
        assert_eq!(tokens[0].text, "CREATE");
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[0].column, 10);
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds_and_text("10 3.14 1.2.3");
        assert_eq!(tokens[0], (TokenKind::Number, "10".to_string()));
        assert_eq!(tokens[1], (TokenKind::Number, "3.14".to_string()));
        assert_eq!(tokens[2], (TokenKind::Number, "1.2".to_string()));
        assert_eq!(tokens[3], (TokenKind::Punctuation, ".".to_string()));
        assert_eq!(tokens[4], (TokenKind::Number, "3".to_string()));
    }

    #[test]
    fn test_operators_prefer_compounds() {
        let ops: Vec<String> = tokenize("a::text <> <= >= != = < |")
            .into_iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text)
            .collect();
        assert_eq!(ops, vec!["::", "<>", "<=", ">=", "!=", "=", "<", "|"]);
    }

    #[test]
    fn test_unknown_characters_skipped() {
        let tokens = kinds_and_text("a @ # $ b");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], (TokenKind::Identifier, "b".to_string()));
    }

    #[test]
    fn test_end_of_input_position() {
        let tokens = tokenize("a\nbc");
        let eof = tokens.last().unwrap();
        assert_eq!(eof.kind, TokenKind::EndOfInput);
        assert_eq!((eof.line, eof.column), (2, 3));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let tokens = tokenize("create /* never closed");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenKind::EndOfInput);
    }

    #[test]
    fn test_array_brackets() {
        let tokens = kinds_and_text("int[]");
        assert_eq!(tokens[1], (TokenKind::Punctuation, "[".to_string()));
        assert_eq!(tokens[2], (TokenKind::Punctuation, "]".to_string()));
    }

    proptest! {
        #[test]
        fn test_tokenize_is_total(input in "\\PC{0,120}") {
            let tokens = tokenize(&input);
            let ends = tokens.iter().filter(|t| t.kind == TokenKind::EndOfInput).count();
            prop_assert_eq!(ends, 1);
            prop_assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::EndOfInput));
            prop_assert!(tokens.iter().all(|t| t.line >= 1));
        }
    }
}
