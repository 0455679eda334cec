//! Error types for the template engine.

use thiserror::Error;

/// Result type alias for parsing.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Result type alias for rendering.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Errors raised while compiling a template (or an embedded expression) into an AST.
///
/// Every variant carries the offending source substring so the message is
/// actionable without a caller having to re-scan the template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unclosed interpolation: {0}")]
    UnclosedInterpolation(String),

    #[error("empty expression in: {0}")]
    EmptyExpression(String),

    #[error("missing condition after {directive}: {source}")]
    MissingCondition { directive: String, source: String },

    #[error("rejected operator `{found}` in: {source} (did you mean `{suggestion}`?)")]
    RejectedOperator {
        found: String,
        suggestion: String,
        source: String,
    },

    #[error("incomplete comparison in: {0}")]
    IncompleteComparison(String),

    #[error("arithmetic not allowed here: {0}")]
    ArithmeticNotAllowed(String),

    #[error("unbalanced parentheses in: {0}")]
    UnbalancedParens(String),

    #[error("malformed loop directive: {0}")]
    MalformedLoop(String),

    #[error("invalid identifier `{0}` in loop directive")]
    InvalidIdentifier(String),

    #[error("`{0}` has no matching $if")]
    OrphanBranch(String),

    #[error("$partial cannot share a mapping with $if/$elif/$else/$for: {0}")]
    PartialConflict(String),

    #[error("$when given with an id or inline form it does not support: {0}")]
    InvalidWhen(String),

    #[error("$partial has an empty name")]
    EmptyPartialName,

    #[error("unknown function `{0}` referenced in expression: {1}")]
    UnknownFunction(String, String),

    #[error("malformed expression: {0}")]
    MalformedExpression(String),
}

/// Errors raised while rendering a compiled AST against data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("loop iterable `{0}` did not resolve to a sequence")]
    NotASequence(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("unknown partial `{0}`")]
    UnknownPartial(String),

    #[error("partial cycle detected: {0}")]
    PartialCycle(String),
}
