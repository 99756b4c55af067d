//! Compatibility Scanner
//!
//! Finds constructs that the rewriter cannot fix and that will behave
//! differently once encapsulation is enabled:
//!
//! - **Incompatible constructs**: computed accesses whose key folds to a
//!   reserved key at parse time (`o["__" + "proto__"]`). They keep working
//!   in legacy realms and are denied in secure realms; the code owner has
//!   to switch to the reflection API.
//! - **Dynamic key copies**: `target[k] = …` inside `for (k in …)`, the
//!   shape of every deep-merge pollution sink. Informational only.

use crate::ast::*;
use crate::token::Span;
use encap_policy::ReservedKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompatKind {
    /// Computed access that statically names a reserved key
    IncompatibleConstruct,
    /// Write through a key produced by key enumeration
    DynamicKeyCopy,
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatDiagnostic {
    pub kind: CompatKind,
    pub span: Span,
    /// Reserved key named by the construct, when known
    pub key: Option<ReservedKey>,
    pub message: String,
}

impl CompatDiagnostic {
    /// Must the code be changed before enabling encapsulation?
    pub fn is_blocking(&self) -> bool {
        self.kind == CompatKind::IncompatibleConstruct
    }
}

impl fmt::Display for CompatDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.is_blocking() { "error" } else { "info" };
        write!(f, "{}: {} at {}", level, self.message, self.span)
    }
}

/// Scan a unit for constructs the rewriter cannot handle
pub fn scan(program: &Program) -> Vec<CompatDiagnostic> {
    let mut scanner = Scanner::default();
    scanner.stmts(&program.body);
    scanner.diagnostics
}

/// Fold string literals joined by `+`
pub fn fold_string(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Str(s) => Some(s.clone()),
        ExprKind::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => {
            let mut folded = fold_string(left)?;
            folded.push_str(&fold_string(right)?);
            Some(folded)
        }
        _ => None,
    }
}

#[derive(Default)]
struct Scanner {
    diagnostics: Vec<CompatDiagnostic>,
    /// Bindings of enclosing `for…in` loops
    enumerated_keys: Vec<String>,
}

impl Scanner {
    fn check_static_key(&mut self, key: &Expr, span: Span) {
        let Some(reserved) = fold_string(key).as_deref().and_then(ReservedKey::from_key) else {
            return;
        };
        self.diagnostics.push(CompatDiagnostic {
            kind: CompatKind::IncompatibleConstruct,
            span,
            key: Some(reserved),
            message: format!(
                "computed access to `{}`; use {} instead",
                reserved,
                reflection_hint(reserved)
            ),
        });
    }

    fn check_write_target(&mut self, target: &Expr) {
        let ExprKind::Member {
            property: MemberProp::Computed(key),
            ..
        } = &target.kind
        else {
            return;
        };
        let ExprKind::Ident(name) = &key.kind else {
            return;
        };
        if self.enumerated_keys.iter().any(|k| k == name) {
            self.diagnostics.push(CompatDiagnostic {
                kind: CompatKind::DynamicKeyCopy,
                span: target.span,
                key: None,
                message: format!("write through enumerated key `{}`", name),
            });
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn decls(&mut self, decls: &[VarDecl]) {
        for init in decls.iter().filter_map(|d| d.init.as_ref()) {
            self.expr(init);
        }
    }

    fn function(&mut self, def: &FunctionDef) {
        // Loop bindings do not reach into nested functions
        let saved = std::mem::take(&mut self.enumerated_keys);
        self.stmts(&def.body);
        self.enumerated_keys = saved;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(_, decls) => self.decls(decls),
            Stmt::Function(def) => self.function(def),
            Stmt::Return(argument) => {
                if let Some(argument) = argument {
                    self.expr(argument);
                }
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.stmt(consequent);
                if let Some(alternate) = alternate {
                    self.stmt(alternate);
                }
            }
            Stmt::While { test, body } => {
                self.expr(test);
                self.stmt(body);
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::Var(_, decls)) => self.decls(decls),
                    Some(ForInit::Expr(e)) => self.expr(e),
                    None => {}
                }
                for e in [test, update].into_iter().flatten() {
                    self.expr(e);
                }
                self.stmt(body);
            }
            Stmt::ForIn {
                name, object, body, ..
            } => {
                self.expr(object);
                self.enumerated_keys.push(name.clone());
                self.stmt(body);
                self.enumerated_keys.pop();
            }
            Stmt::Throw(e) | Stmt::Expr(e) => self.expr(e),
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.stmts(block);
                for body in [handler, finalizer].into_iter().flatten() {
                    self.stmts(body);
                }
            }
            Stmt::Block(body) => self.stmts(body),
            Stmt::Break | Stmt::Continue | Stmt::Empty => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Member { object, property } => {
                self.expr(object);
                if let MemberProp::Computed(key) = property {
                    self.check_static_key(key, expr.span);
                    self.expr(key);
                }
            }
            ExprKind::Object(properties) => {
                for property in properties {
                    if let PropKey::Computed(key) = &property.key {
                        self.check_static_key(key, key.span);
                        self.expr(key);
                    }
                    self.expr(&property.value);
                }
            }
            ExprKind::Array(elements) => {
                for element in elements {
                    self.expr(element);
                }
            }
            ExprKind::Function(def) => self.function(def),
            ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Unary { argument, .. } => self.expr(argument),
            ExprKind::Update { target, .. } => {
                self.check_write_target(target);
                self.expr(target);
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Assign { target, value, .. } => {
                self.check_write_target(target);
                self.expr(target);
                self.expr(value);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
            }
            ExprKind::Number(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::Intrinsic(_) => {}
        }
    }
}

fn reflection_hint(key: ReservedKey) -> &'static str {
    match key {
        ReservedKey::Proto => "Object.getPrototypeOf/Object.setPrototypeOf or Symbol.proto",
        ReservedKey::Prototype => "Symbol.instanceProto",
        ReservedKey::Constructor => "Symbol.ctor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn findings(source: &str) -> Vec<CompatDiagnostic> {
        scan(&parse(source).unwrap())
    }

    #[test]
    fn test_folded_reserved_key() {
        let diags = findings("var p = o[\"__\" + \"proto__\"];");

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, CompatKind::IncompatibleConstruct);
        assert_eq!(diags[0].key, Some(ReservedKey::Proto));
        assert!(diags[0].is_blocking());
        assert!(diags[0].to_string().starts_with("error: computed access to `__proto__`"));
    }

    #[test]
    fn test_literal_computed_keys() {
        let diags = findings("o['constructor']; x = { ['proto' + 'type']: 1 };");

        let keys: Vec<_> = diags.iter().map(|d| d.key).collect();
        assert_eq!(
            keys,
            vec![Some(ReservedKey::Constructor), Some(ReservedKey::Prototype)]
        );
    }

    #[test]
    fn test_static_access_is_not_reported() {
        assert!(findings("o.__proto__; o.constructor; o[k]; o['name'];").is_empty());
    }

    #[test]
    fn test_merge_shape() {
        let diags = findings(
            "function merge(t, s) {
                for (var k in s) {
                    if (typeof s[k] === 'object') merge(t[k], s[k]);
                    else t[k] = s[k];
                }
            }",
        );

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, CompatKind::DynamicKeyCopy);
        assert!(!diags[0].is_blocking());
        assert_eq!(diags[0].span.line, 4);
    }

    #[test]
    fn test_loop_binding_does_not_leak_into_functions() {
        let diags = findings("for (var k in s) { f = function () { t[k] = 1; }; }");
        assert!(diags.is_empty());
    }
}
