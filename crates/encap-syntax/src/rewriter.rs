//! Parse-Time Rewriter
//!
//! Replaces every statically visible reserved-key reference with its
//! reflection equivalent before a unit runs in encapsulation mode.
//!
//! | Source | Rewritten |
//! |--------|-----------|
//! | `e.__proto__` (read) | `Object.getPrototypeOf(e)` |
//! | `e.__proto__ = v`, `e.__proto__++`, `delete e.__proto__`, `e.__proto__()` | `e[Symbol.proto]` |
//! | `e.prototype` | `e[Symbol.instanceProto]` |
//! | `e.constructor` | `e[Symbol.ctor]` |
//! | `{ __proto__: p }` | `{ [Symbol.proto]: p }` |
//! | `{ prototype: v }` / `{ constructor: v }` | `{ [Symbol.instanceProto]: v }` / `{ [Symbol.ctor]: v }` |
//!
//! `Object.getPrototypeOf` and `Symbol.*` in the output are `Intrinsic`
//! nodes bound to the realm's own built-ins; they print with their source
//! spelling but never go through scope lookup. Literal entries are
//! rewritten in place, so property order and evaluation order are kept.
//!
//! Computed accesses (`e[k]`) are never touched: whether `k` names a
//! reserved key is only known at run time, where the property resolver
//! decides. The replacement forms contain no reserved keys, so rewriting
//! rewritten code changes nothing.

use crate::ast::*;
use crate::error::ParseError;
use crate::parser::parse;
use crate::printer::{print_expr, print_program, print_property};
use crate::token::Span;
use encap_policy::{ModeController, ReflectionForm, ReservedKey};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{debug, info};

/// One rewritten reserved-key reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRecord {
    /// Location of the original reference
    pub span: Span,
    /// Which reserved key was referenced
    pub key: ReservedKey,
    /// Reflection operation it now uses
    pub form: ReflectionForm,
    /// Original expression, printed
    pub original: String,
    /// Replacement expression, printed
    pub rewritten: String,
}

/// Rewritten tree plus its records
#[derive(Debug, Clone)]
pub struct RewriteOutput {
    pub program: Program,
    pub records: Vec<RewriteRecord>,
}

/// Rewritten source text plus its records
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenSource {
    pub code: String,
    pub records: Vec<RewriteRecord>,
}

/// Mode-gated rewriting pass
#[derive(Debug, Clone, Copy)]
pub struct Rewriter {
    mode: ModeController,
}

impl Rewriter {
    pub fn new(mode: ModeController) -> Self {
        Self { mode }
    }

    /// Mode this rewriter was created for
    pub fn mode(&self) -> ModeController {
        self.mode
    }

    /// Rewrite a parsed unit; a no-op unless encapsulation is enabled
    pub fn rewrite(&self, program: Program) -> RewriteOutput {
        if !self.mode.is_secure_mode_enabled() {
            return RewriteOutput {
                program,
                records: Vec::new(),
            };
        }

        let mut pass = RewritePass::default();
        let body = pass.stmts(program.body);
        let mut records = pass.records;
        records.sort_by_key(|r| r.span.start);

        if records.is_empty() {
            debug!("No static reserved-key references to rewrite");
        } else {
            info!("Rewrote {} static reserved-key references", records.len());
        }

        RewriteOutput {
            program: Program { body },
            records,
        }
    }

    /// Parse, rewrite and print a unit
    ///
    /// With encapsulation disabled the source comes back untouched.
    pub fn rewrite_source(&self, source: &str) -> Result<RewrittenSource, ParseError> {
        if !self.mode.is_secure_mode_enabled() {
            return Ok(RewrittenSource {
                code: source.to_string(),
                records: Vec::new(),
            });
        }

        let output = self.rewrite(parse(source)?);
        Ok(RewrittenSource {
            code: print_program(&output.program),
            records: output.records,
        })
    }
}

#[derive(Default)]
struct RewritePass {
    records: Vec<RewriteRecord>,
}

/// Where a member expression appears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Value is read
    Read,
    /// Written, updated, deleted or called as a method
    Reference,
}

fn symbol_member(form: ReflectionForm, span: Span) -> Expr {
    Expr::intrinsic(Intrinsic::Symbol(form), span)
}

fn get_prototype_of(object: Expr, span: Span) -> Expr {
    Expr::call(
        Expr::intrinsic(Intrinsic::GetPrototypeOf, span),
        vec![object],
        span,
    )
}

impl RewritePass {
    fn record(&mut self, span: Span, key: ReservedKey, original: String, rewritten: String) {
        self.records.push(RewriteRecord {
            span,
            key,
            form: key.reflection(),
            original,
            rewritten,
        });
    }

    fn stmts(&mut self, stmts: Vec<Stmt>) -> Vec<Stmt> {
        stmts.into_iter().map(|s| self.stmt(s)).collect()
    }

    fn boxed_stmt(&mut self, stmt: Box<Stmt>) -> Box<Stmt> {
        Box::new(self.stmt(*stmt))
    }

    fn decls(&mut self, decls: Vec<VarDecl>) -> Vec<VarDecl> {
        decls
            .into_iter()
            .map(|d| VarDecl {
                name: d.name,
                init: d.init.map(|e| self.expr(e)),
            })
            .collect()
    }

    fn function(&mut self, def: Rc<FunctionDef>) -> Rc<FunctionDef> {
        let def = Rc::try_unwrap(def).unwrap_or_else(|shared| (*shared).clone());
        Rc::new(FunctionDef {
            body: self.stmts(def.body),
            ..def
        })
    }

    fn stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::Var(kind, decls) => Stmt::Var(kind, self.decls(decls)),
            Stmt::Function(def) => Stmt::Function(self.function(def)),
            Stmt::Return(argument) => Stmt::Return(argument.map(|e| self.expr(e))),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => Stmt::If {
                test: self.expr(test),
                consequent: self.boxed_stmt(consequent),
                alternate: alternate.map(|s| self.boxed_stmt(s)),
            },
            Stmt::While { test, body } => Stmt::While {
                test: self.expr(test),
                body: self.boxed_stmt(body),
            },
            Stmt::For {
                init,
                test,
                update,
                body,
            } => Stmt::For {
                init: init.map(|init| match init {
                    ForInit::Var(kind, decls) => ForInit::Var(kind, self.decls(decls)),
                    ForInit::Expr(e) => ForInit::Expr(self.expr(e)),
                }),
                test: test.map(|e| self.expr(e)),
                update: update.map(|e| self.expr(e)),
                body: self.boxed_stmt(body),
            },
            Stmt::ForIn {
                kind,
                name,
                object,
                body,
            } => Stmt::ForIn {
                kind,
                name,
                object: self.expr(object),
                body: self.boxed_stmt(body),
            },
            Stmt::Throw(e) => Stmt::Throw(self.expr(e)),
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => Stmt::Try {
                block: self.stmts(block),
                param,
                handler: handler.map(|h| self.stmts(h)),
                finalizer: finalizer.map(|f| self.stmts(f)),
            },
            Stmt::Block(body) => Stmt::Block(self.stmts(body)),
            Stmt::Expr(e) => Stmt::Expr(self.expr(e)),
            other @ (Stmt::Break | Stmt::Continue | Stmt::Empty) => other,
        }
    }

    fn exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&mut self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.expr(*expr))
    }

    fn expr(&mut self, expr: Expr) -> Expr {
        self.expr_in(expr, Position::Read)
    }

    fn expr_in(&mut self, expr: Expr, position: Position) -> Expr {
        let span = expr.span;
        match expr.kind {
            ExprKind::Member {
                object,
                property: MemberProp::Named(name),
            } => match ReservedKey::from_key(&name) {
                Some(key) => {
                    let original = print_expr(&Expr::named_member(*object.clone(), &name, span));
                    let object = self.expr(*object);
                    let rewritten = match (key, position) {
                        (ReservedKey::Proto, Position::Read) => get_prototype_of(object, span),
                        _ => Expr::computed_member(
                            object,
                            symbol_member(key.reflection(), span),
                            span,
                        ),
                    };
                    self.record(span, key, original, print_expr(&rewritten));
                    rewritten
                }
                None => Expr::named_member(self.expr(*object), &name, span),
            },
            ExprKind::Member {
                object,
                property: MemberProp::Computed(key),
            } => Expr::computed_member(self.expr(*object), self.expr(*key), span),
            ExprKind::Object(properties) => self.object_literal(properties, span),
            ExprKind::Array(elements) => Expr::new(ExprKind::Array(self.exprs(elements)), span),
            ExprKind::Function(def) => Expr::new(ExprKind::Function(self.function(def)), span),
            ExprKind::Call { callee, args } => Expr::new(
                ExprKind::Call {
                    callee: Box::new(self.expr_in(*callee, Position::Reference)),
                    args: self.exprs(args),
                },
                span,
            ),
            ExprKind::New { callee, args } => Expr::new(
                ExprKind::New {
                    callee: self.boxed(callee),
                    args: self.exprs(args),
                },
                span,
            ),
            ExprKind::Unary { op, argument } => {
                let position = if op == UnaryOp::Delete {
                    Position::Reference
                } else {
                    Position::Read
                };
                Expr::new(
                    ExprKind::Unary {
                        op,
                        argument: Box::new(self.expr_in(*argument, position)),
                    },
                    span,
                )
            }
            ExprKind::Update { op, prefix, target } => Expr::new(
                ExprKind::Update {
                    op,
                    prefix,
                    target: Box::new(self.expr_in(*target, Position::Reference)),
                },
                span,
            ),
            ExprKind::Binary { op, left, right } => Expr::new(
                ExprKind::Binary {
                    op,
                    left: self.boxed(left),
                    right: self.boxed(right),
                },
                span,
            ),
            ExprKind::Logical { op, left, right } => Expr::new(
                ExprKind::Logical {
                    op,
                    left: self.boxed(left),
                    right: self.boxed(right),
                },
                span,
            ),
            ExprKind::Assign { op, target, value } => Expr::new(
                ExprKind::Assign {
                    op,
                    target: Box::new(self.expr_in(*target, Position::Reference)),
                    value: self.boxed(value),
                },
                span,
            ),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => Expr::new(
                ExprKind::Conditional {
                    test: self.boxed(test),
                    consequent: self.boxed(consequent),
                    alternate: self.boxed(alternate),
                },
                span,
            ),
            kind @ (ExprKind::Number(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::Intrinsic(_)) => Expr::new(kind, span),
        }
    }

    fn object_literal(&mut self, properties: Vec<Property>, span: Span) -> Expr {
        let mut rewritten = Vec::with_capacity(properties.len());

        for property in properties {
            let reserved = property
                .key
                .static_name()
                .and_then(ReservedKey::from_key);

            match reserved {
                Some(key) => {
                    let original = print_property(&property);
                    let entry = Property {
                        key: PropKey::Computed(Box::new(symbol_member(
                            key.reflection(),
                            property.span,
                        ))),
                        value: self.expr(property.value),
                        span: property.span,
                    };
                    self.record(property.span, key, original, print_property(&entry));
                    rewritten.push(entry);
                }
                None => {
                    let key = match property.key {
                        PropKey::Computed(key) => PropKey::Computed(self.boxed(key)),
                        other => other,
                    };
                    rewritten.push(Property {
                        key,
                        value: self.expr(property.value),
                        span: property.span,
                    });
                }
            }
        }

        Expr::new(ExprKind::Object(rewritten), span)
    }
}
