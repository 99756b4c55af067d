//! Abstract syntax tree of the script language.
//!
//! Function bodies are reference counted so the interpreter can capture a
//! function without cloning its body.

use crate::token::Span;
use encap_policy::ReflectionForm;
use std::rc::Rc;

/// Directive that declares a script was written for encapsulation mode
pub const ENCAPSULATION_DIRECTIVE: &str = "use encapsulation";

/// A compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

impl Program {
    /// Directive prologue: leading string-literal expression statements
    pub fn directives(&self) -> impl Iterator<Item = &str> {
        directive_prologue(&self.body)
    }

    /// Does the script declare `"use encapsulation"`?
    pub fn requests_encapsulation(&self) -> bool {
        self.directives().any(|d| d == ENCAPSULATION_DIRECTIVE)
    }
}

pub(crate) fn directive_prologue(body: &[Stmt]) -> impl Iterator<Item = &str> {
    body.iter().map_while(|stmt| match stmt {
        Stmt::Expr(Expr {
            kind: ExprKind::Str(s),
            ..
        }) => Some(s.as_str()),
        _ => None,
    })
}

/// Declaration keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Let => "let",
            Self::Const => "const",
        }
    }
}

/// One binding in a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub init: Option<Expr>,
}

/// A function declaration or expression
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `for (init; …)` initialiser
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Var(VarKind, Vec<VarDecl>),
    Expr(Expr),
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var(VarKind, Vec<VarDecl>),
    Function(Rc<FunctionDef>),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        kind: Option<VarKind>,
        name: String,
        object: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<String>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Block(Vec<Stmt>),
    Expr(Expr),
    Empty,
}

/// An expression with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Identifier expression
    pub fn ident(name: &str, span: Span) -> Self {
        Self::new(ExprKind::Ident(name.to_string()), span)
    }

    /// `object.name`
    pub fn named_member(object: Expr, name: &str, span: Span) -> Self {
        Self::new(
            ExprKind::Member {
                object: Box::new(object),
                property: MemberProp::Named(name.to_string()),
            },
            span,
        )
    }

    /// `object[key]`
    pub fn computed_member(object: Expr, key: Expr, span: Span) -> Self {
        Self::new(
            ExprKind::Member {
                object: Box::new(object),
                property: MemberProp::Computed(Box::new(key)),
            },
            span,
        )
    }

    /// Realm built-in, bound at evaluation rather than looked up
    pub fn intrinsic(intrinsic: Intrinsic, span: Span) -> Self {
        Self::new(ExprKind::Intrinsic(intrinsic), span)
    }

    /// `callee(args…)`
    pub fn call(callee: Expr, args: Vec<Expr>, span: Span) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span,
        )
    }

    /// Is this a valid assignment target?
    pub fn is_assignable(&self) -> bool {
        matches!(self.kind, ExprKind::Ident(_) | ExprKind::Member { .. })
    }
}

/// Property name in a member access
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    /// `obj.name`
    Named(String),
    /// `obj[expr]`
    Computed(Box<Expr>),
}

/// Key of an object-literal property
#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(String),
    Str(String),
    Number(f64),
    Computed(Box<Expr>),
}

impl PropKey {
    /// Statically known string key, if any
    pub fn static_name(&self) -> Option<&str> {
        match self {
            Self::Ident(name) | Self::Str(name) => Some(name),
            _ => None,
        }
    }
}

/// Object-literal property
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: PropKey,
    pub value: Expr,
    /// Location of the key
    pub span: Span,
}

/// Built-in that rewritten code refers to
///
/// The rewriter emits these instead of the identifiers `Object` and
/// `Symbol` so a local binding or a reassigned global cannot change what
/// the rewritten access means. They print as their source spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// `Symbol.proto`, `Symbol.instanceProto` or `Symbol.ctor`
    Symbol(ReflectionForm),
    /// `Object.getPrototypeOf`
    GetPrototypeOf,
}

impl Intrinsic {
    /// Source spelling
    pub fn source_text(&self) -> String {
        match self {
            Self::Symbol(form) => format!("Symbol.{}", form.symbol_name()),
            Self::GetPrototypeOf => "Object.getPrototypeOf".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    This,
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Function(Rc<FunctionDef>),
    Member {
        object: Box<Expr>,
        property: MemberProp,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// Only produced by the rewriter
    Intrinsic(Intrinsic),
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
            Self::Plus => "+",
            Self::Typeof => "typeof",
            Self::Void => "void",
            Self::Delete => "delete",
        }
    }
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::In => "in",
            Self::Instanceof => "instanceof",
        }
    }

    /// Binding power, shared by the parser and the printer
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Eq | Self::NotEq | Self::StrictEq | Self::StrictNotEq => 9,
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq | Self::In | Self::Instanceof => 10,
            Self::Add | Self::Sub => 12,
            Self::Mul | Self::Div | Self::Rem => 13,
        }
    }
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            Self::Or => 4,
            Self::And => 5,
        }
    }
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
        }
    }
}

/// Precedence levels used by the printer
pub mod precedence {
    pub const ASSIGN: u8 = 2;
    pub const CONDITIONAL: u8 = 3;
    pub const UNARY: u8 = 15;
    pub const POSTFIX: u8 = 16;
    pub const MEMBER: u8 = 18;
    pub const PRIMARY: u8 = 20;
}

impl Expr {
    /// Binding power of this expression's outermost operator
    pub fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Assign { .. } => precedence::ASSIGN,
            ExprKind::Conditional { .. } => precedence::CONDITIONAL,
            ExprKind::Logical { op, .. } => op.precedence(),
            ExprKind::Binary { op, .. } => op.precedence(),
            ExprKind::Unary { .. } => precedence::UNARY,
            ExprKind::Update { prefix: true, .. } => precedence::UNARY,
            ExprKind::Update { prefix: false, .. } => precedence::POSTFIX,
            ExprKind::Member { .. }
            | ExprKind::Call { .. }
            | ExprKind::New { .. }
            | ExprKind::Intrinsic(_) => precedence::MEMBER,
            _ => precedence::PRIMARY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn str_stmt(s: &str) -> Stmt {
        Stmt::Expr(Expr::new(ExprKind::Str(s.into()), Span::default()))
    }

    #[test]
    fn test_directive_prologue() {
        let program = Program {
            body: vec![
                str_stmt("use strict"),
                str_stmt(ENCAPSULATION_DIRECTIVE),
                Stmt::Empty,
                str_stmt("not a directive"),
            ],
        };

        assert_eq!(
            program.directives().collect::<Vec<_>>(),
            vec!["use strict", ENCAPSULATION_DIRECTIVE]
        );
        assert!(program.requests_encapsulation());
    }

    #[test]
    fn test_prop_key_static_name() {
        assert_eq!(PropKey::Ident("__proto__".into()).static_name(), Some("__proto__"));
        assert_eq!(PropKey::Number(1.0).static_name(), None);
    }
}
