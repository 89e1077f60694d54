/// Lexical building blocks shared by the format handlers
///
/// The Ruby lexer and literal decoder serve both plain Ruby files and the
/// code buffers pulled out of ERB templates by the template splitter.

pub mod lexer;
pub mod literal;
pub mod template;

pub use lexer::{tokenize, Comment, Lexed, Token, TokenKind};
pub use literal::{QuoteStyle, StrLiteral};
pub use template::{CodeBuffer, LineOffsets};
