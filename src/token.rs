//! Token types produced by the expression lexer.

/// Token kinds recognized inside an expression string (the content of a
/// `${…}` interpolation, a `$if`/`$when` condition, or a `$for` iterable).
#[derive(Debug, PartialEq, Clone, Eq)]
pub enum TokenKind {
    // Literals
    StringLiteral,
    NumberLiteral,
    BooleanLiteral,
    NullLiteral,
    EmptyMapping, // {}
    EmptySequence, // []

    // Identifiers (variable paths, function names)
    Identifier,

    // Keyword operator (must be whitespace-bounded)
    In,

    // Operators
    Or,             // ||
    And,            // &&
    Not,            // !
    Eq,             // ==
    Neq,            // !=
    Lt,             // <
    Lte,            // <=
    Gt,             // >
    Gte,            // >=
    Plus,  // + (whitespace-bounded)
    Minus, // - (whitespace-bounded)

    // Delimiters
    OpenParen,
    CloseParen,
    Comma,

    Eof,
}

/// A lexed token with its source span, used to reconstruct offending
/// substrings for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
        }
    }

    pub fn eof(pos: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            start: pos,
            end: pos,
        }
    }
}
