//! Canonical source printer
//!
//! Prints an AST back to source text in a single canonical layout. The
//! printer inserts parentheses only where precedence requires them, and
//! parses of its own output print identically, so "rewrite twice" can be
//! compared byte for byte.

use crate::ast::*;
use std::fmt::Write as _;

const INDENT: &str = "    ";

/// Print a whole compilation unit
pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::default();
    for stmt in &program.body {
        printer.stmt(stmt);
        printer.out.push('\n');
    }
    printer.out
}

/// Print a single expression
pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr);
    printer.out
}

/// Print one object-literal entry as `key: value`
pub fn print_property(property: &Property) -> String {
    let mut printer = Printer::default();
    printer.property(property);
    printer.out
}

/// Format a number the way the language's `String(n)` does
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{}", n);
    }

    let s = format!("{:e}", n);
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => s,
    }
}

/// Quote a string as a double-quoted literal
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        self.depth += 1;
        for stmt in body {
            self.indent();
            self.stmt(stmt);
            self.out.push('\n');
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
    }

    fn declarations(&mut self, kind: VarKind, decls: &[VarDecl]) {
        self.out.push_str(kind.as_str());
        self.out.push(' ');
        for (i, decl) in decls.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&decl.name);
            if let Some(init) = &decl.init {
                self.out.push_str(" = ");
                self.expr_at(init, precedence::ASSIGN);
            }
        }
    }

    fn function(&mut self, def: &FunctionDef) {
        self.out.push_str("function ");
        if let Some(name) = &def.name {
            self.out.push_str(name);
        }
        self.out.push('(');
        self.out.push_str(&def.params.join(", "));
        self.out.push_str(") ");
        self.block(&def.body);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(kind, decls) => {
                self.declarations(*kind, decls);
                self.out.push(';');
            }
            Stmt::Function(def) => self.function(def),
            Stmt::Return(argument) => {
                self.out.push_str("return");
                if let Some(argument) = argument {
                    self.out.push(' ');
                    self.expr(argument);
                }
                self.out.push(';');
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.out.push_str("if (");
                self.expr(test);
                self.out.push_str(") ");
                match alternate {
                    Some(alternate) => {
                        if ends_with_open_if(consequent) {
                            self.block(std::slice::from_ref(consequent.as_ref()));
                        } else {
                            self.stmt(consequent);
                        }
                        self.out.push_str(" else ");
                        self.stmt(alternate);
                    }
                    None => self.stmt(consequent),
                }
            }
            Stmt::While { test, body } => {
                self.out.push_str("while (");
                self.expr(test);
                self.out.push_str(") ");
                self.stmt(body);
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                self.out.push_str("for (");
                match init {
                    Some(ForInit::Var(kind, decls)) => self.declarations(*kind, decls),
                    Some(ForInit::Expr(expr)) if contains_in(expr) => {
                        self.out.push('(');
                        self.expr(expr);
                        self.out.push(')');
                    }
                    Some(ForInit::Expr(expr)) => self.expr(expr),
                    None => {}
                }
                self.out.push(';');
                if let Some(test) = test {
                    self.out.push(' ');
                    self.expr(test);
                }
                self.out.push(';');
                if let Some(update) = update {
                    self.out.push(' ');
                    self.expr(update);
                }
                self.out.push_str(") ");
                self.stmt(body);
            }
            Stmt::ForIn {
                kind,
                name,
                object,
                body,
            } => {
                self.out.push_str("for (");
                if let Some(kind) = kind {
                    self.out.push_str(kind.as_str());
                    self.out.push(' ');
                }
                self.out.push_str(name);
                self.out.push_str(" in ");
                self.expr(object);
                self.out.push_str(") ");
                self.stmt(body);
            }
            Stmt::Break => self.out.push_str("break;"),
            Stmt::Continue => self.out.push_str("continue;"),
            Stmt::Throw(argument) => {
                self.out.push_str("throw ");
                self.expr(argument);
                self.out.push(';');
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                self.out.push_str("try ");
                self.block(block);
                if let Some(handler) = handler {
                    self.out.push_str(" catch ");
                    if let Some(param) = param {
                        self.out.push('(');
                        self.out.push_str(param);
                        self.out.push_str(") ");
                    }
                    self.block(handler);
                }
                if let Some(finalizer) = finalizer {
                    self.out.push_str(" finally ");
                    self.block(finalizer);
                }
            }
            Stmt::Block(body) => self.block(body),
            Stmt::Expr(expr) => {
                if starts_ambiguously(expr) {
                    self.out.push('(');
                    self.expr(expr);
                    self.out.push(')');
                } else {
                    self.expr(expr);
                }
                self.out.push(';');
            }
            Stmt::Empty => self.out.push(';'),
        }
    }

    /// Print `expr`, parenthesised if it binds looser than `min`
    fn expr_at(&mut self, expr: &Expr, min: u8) {
        if expr.precedence() < min {
            self.out.push('(');
            self.expr(expr);
            self.out.push(')');
        } else {
            self.expr(expr);
        }
    }

    fn args(&mut self, args: &[Expr]) {
        self.out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr_at(arg, precedence::ASSIGN);
        }
        self.out.push(')');
    }

    fn member_object(&mut self, object: &Expr) {
        if matches!(object.kind, ExprKind::Number(_)) {
            self.out.push('(');
            self.expr(object);
            self.out.push(')');
        } else {
            self.expr_at(object, precedence::MEMBER);
        }
    }

    fn property(&mut self, property: &Property) {
        match &property.key {
            PropKey::Ident(name) => self.out.push_str(name),
            PropKey::Str(s) => self.out.push_str(&quote_string(s)),
            PropKey::Number(n) => self.out.push_str(&format_number(*n)),
            PropKey::Computed(key) => {
                self.out.push('[');
                self.expr_at(key, precedence::ASSIGN);
                self.out.push(']');
            }
        }
        self.out.push_str(": ");
        self.expr_at(&property.value, precedence::ASSIGN);
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Number(n) => self.out.push_str(&format_number(*n)),
            ExprKind::Str(s) => self.out.push_str(&quote_string(s)),
            ExprKind::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            ExprKind::Null => self.out.push_str("null"),
            ExprKind::Ident(name) => self.out.push_str(name),
            ExprKind::This => self.out.push_str("this"),
            ExprKind::Array(elements) => {
                self.out.push('[');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr_at(element, precedence::ASSIGN);
                }
                self.out.push(']');
            }
            ExprKind::Object(properties) => {
                if properties.is_empty() {
                    self.out.push_str("{}");
                    return;
                }
                self.out.push_str("{ ");
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.property(property);
                }
                self.out.push_str(" }");
            }
            ExprKind::Intrinsic(intrinsic) => self.out.push_str(&intrinsic.source_text()),
            ExprKind::Function(def) => self.function(def),
            ExprKind::Member { object, property } => {
                self.member_object(object);
                match property {
                    MemberProp::Named(name) => {
                        self.out.push('.');
                        self.out.push_str(name);
                    }
                    MemberProp::Computed(key) => {
                        self.out.push('[');
                        self.expr(key);
                        self.out.push(']');
                    }
                }
            }
            ExprKind::Call { callee, args } => {
                self.expr_at(callee, precedence::MEMBER);
                self.args(args);
            }
            ExprKind::New { callee, args } => {
                self.out.push_str("new ");
                if has_call_in_chain(callee) {
                    self.out.push('(');
                    self.expr(callee);
                    self.out.push(')');
                } else {
                    self.expr_at(callee, precedence::MEMBER);
                }
                self.args(args);
            }
            ExprKind::Unary { op, argument } => {
                self.out.push_str(op.as_str());
                let nested_sign = matches!(op, UnaryOp::Neg | UnaryOp::Plus)
                    && matches!(
                        argument.kind,
                        ExprKind::Unary {
                            op: UnaryOp::Neg | UnaryOp::Plus,
                            ..
                        } | ExprKind::Update { prefix: true, .. }
                    );
                if matches!(op, UnaryOp::Typeof | UnaryOp::Void | UnaryOp::Delete) {
                    self.out.push(' ');
                }
                if nested_sign {
                    self.out.push('(');
                    self.expr(argument);
                    self.out.push(')');
                } else {
                    self.expr_at(argument, precedence::UNARY);
                }
            }
            ExprKind::Update { op, prefix, target } => {
                let symbol = match op {
                    UpdateOp::Increment => "++",
                    UpdateOp::Decrement => "--",
                };
                if *prefix {
                    self.out.push_str(symbol);
                    self.expr_at(target, precedence::UNARY);
                } else {
                    self.expr_at(target, precedence::POSTFIX);
                    self.out.push_str(symbol);
                }
            }
            ExprKind::Binary { op, left, right } => {
                self.infix(left, op.as_str(), op.precedence(), right);
            }
            ExprKind::Logical { op, left, right } => {
                self.infix(left, op.as_str(), op.precedence(), right);
            }
            ExprKind::Assign { op, target, value } => {
                self.expr_at(target, precedence::POSTFIX);
                self.out.push(' ');
                self.out.push_str(op.as_str());
                self.out.push(' ');
                self.expr_at(value, precedence::ASSIGN);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr_at(test, precedence::CONDITIONAL + 1);
                self.out.push_str(" ? ");
                self.expr_at(consequent, precedence::ASSIGN);
                self.out.push_str(" : ");
                self.expr_at(alternate, precedence::ASSIGN);
            }
        }
    }

    fn infix(&mut self, left: &Expr, op: &str, precedence: u8, right: &Expr) {
        self.expr_at(left, precedence);
        self.out.push(' ');
        self.out.push_str(op);
        self.out.push(' ');
        self.expr_at(right, precedence + 1);
    }
}

/// Would the consequent swallow a following `else`?
fn ends_with_open_if(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::If {
            alternate: None, ..
        } => true,
        Stmt::If {
            alternate: Some(alternate),
            ..
        } => ends_with_open_if(alternate),
        Stmt::While { body, .. } | Stmt::For { body, .. } | Stmt::ForIn { body, .. } => {
            ends_with_open_if(body)
        }
        _ => false,
    }
}

/// Would an expression statement start with `{` or `function`?
fn starts_ambiguously(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Object(_) | ExprKind::Function(_) => true,
        ExprKind::Member { object, .. } => starts_ambiguously(object),
        ExprKind::Call { callee, .. } => starts_ambiguously(callee),
        ExprKind::Binary { left, .. } | ExprKind::Logical { left, .. } => starts_ambiguously(left),
        ExprKind::Assign { target, .. } => starts_ambiguously(target),
        ExprKind::Conditional { test, .. } => starts_ambiguously(test),
        ExprKind::Update {
            prefix: false,
            target,
            ..
        } => starts_ambiguously(target),
        _ => false,
    }
}

/// Does a `new` callee contain a call that would capture the arguments?
fn has_call_in_chain(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Member { object, .. } => has_call_in_chain(object),
        _ => false,
    }
}

/// Does a `for` initialiser contain an `in` operator outside functions?
fn contains_in(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Binary { op, left, right } => {
            *op == BinaryOp::In || contains_in(left) || contains_in(right)
        }
        ExprKind::Logical { left, right, .. } => contains_in(left) || contains_in(right),
        ExprKind::Assign { target, value, .. } => contains_in(target) || contains_in(value),
        ExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => contains_in(test) || contains_in(consequent) || contains_in(alternate),
        ExprKind::Unary { argument, .. } => contains_in(argument),
        ExprKind::Member { object, property } => {
            contains_in(object)
                || matches!(property, MemberProp::Computed(key) if contains_in(key))
        }
        ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
            contains_in(callee) || args.iter().any(contains_in)
        }
        ExprKind::Array(elements) => elements.iter().any(contains_in),
        ExprKind::Object(properties) => properties.iter().any(|p| contains_in(&p.value)),
        _ => false,
    }
}
