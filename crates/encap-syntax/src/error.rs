//! Syntax errors

use crate::token::Span;

/// What went wrong while lexing or parsing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),

    #[error("invalid or unterminated string literal")]
    InvalidString,

    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(String),

    #[error("invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("duplicate __proto__ in object literal")]
    DuplicateProto,

    #[error("`{0}` outside of a loop")]
    StrayJump(&'static str),

    #[error("`return` outside of a function")]
    StrayReturn,

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

/// A syntax error with its position
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("SyntaxError: {kind} at {span}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}
