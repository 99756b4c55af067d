//! Encap Syntax - Script Front End
//!
//! Lexer, parser, canonical printer and the parse-time rewriting pass for
//! the script language.
//!
//! # Pipeline
//!
//! ```text
//! source ──tokenize──▶ tokens ──parse──▶ Program
//!                                          │
//!                            Rewriter (encapsulation enabled only)
//!                                          │
//!                                          ▼
//!                       Program without static reserved-key references
//!                                          │
//!                             print_program (optional)
//! ```
//!
//! The compatibility scanner runs on any parsed program and reports the
//! constructs the rewriter deliberately leaves alone.

mod ast;
mod compat;
mod error;
mod lexer;
mod parser;
mod printer;
mod rewriter;
mod token;

pub use ast::{
    AssignOp, BinaryOp, Expr, ExprKind, ForInit, FunctionDef, Intrinsic, LogicalOp, MemberProp,
    Program, PropKey, Property, Stmt, UnaryOp, UpdateOp, VarDecl, VarKind,
    ENCAPSULATION_DIRECTIVE,
};
pub use compat::{fold_string, scan, CompatDiagnostic, CompatKind};
pub use error::{ParseError, ParseErrorKind};
pub use lexer::tokenize;
pub use parser::{parse, Parser, MAX_NESTING_DEPTH};
pub use printer::{format_number, print_expr, print_program, print_property, quote_string};
pub use rewriter::{RewriteOutput, RewriteRecord, RewrittenSource, Rewriter};
pub use token::{Span, Token};
