//! SQL DDL to schema model.

mod lexer;
mod parser;
mod stream;
mod types;

pub use lexer::{Lexer, Token, TokenKind, is_keyword, tokenize};
pub use parser::{SqlError, parse};
pub use stream::{Mark, TokenStream};
