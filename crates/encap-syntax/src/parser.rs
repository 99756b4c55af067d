//! Recursive-descent parser
//!
//! Produces a [`Program`] from source text. Binary operators are parsed by
//! precedence climbing using the same binding powers the printer uses, so
//! printed output re-parses to the same tree.

use crate::ast::*;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::tokenize;
use crate::token::{Span, Token};
use std::rc::Rc;
use tracing::trace;

/// Deepest nesting of statements and expressions the parser accepts
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parse a compilation unit
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let program = Parser::new(source)?.parse_program()?;
    trace!("Parsed {} top-level statements", program.body.len());
    Ok(program)
}

/// Parser state over a pre-tokenized unit
pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    eof_span: Span,
    prev_span: Span,
    function_depth: usize,
    loop_depth: usize,
    nesting: usize,
}

impl Parser {
    /// Tokenize `source` and prepare to parse it
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(source)?;
        let (line, column) = end_position(source);
        let eof_span = Span::new(source.len(), source.len(), line, column);

        Ok(Self {
            tokens,
            pos: 0,
            eof_span,
            prev_span: Span::default(),
            function_depth: 0,
            loop_depth: 0,
            nesting: 0,
        })
    }

    /// Parse every statement up to end of input
    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !self.at_end() {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(token, _)| token)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| *span)
            .unwrap_or(self.eof_span)
    }

    fn advance(&mut self) -> Option<Token> {
        let (token, span) = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        self.prev_span = span;
        Some(token)
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<Span, ParseError> {
        if self.eat(expected) {
            Ok(self.prev_span)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::new(
                ParseErrorKind::UnexpectedToken {
                    found: token.describe(),
                    expected: expected.to_string(),
                },
                self.peek_span(),
            ),
            None => ParseError::new(
                ParseErrorKind::UnexpectedEof(expected.to_string()),
                self.eof_span,
            ),
        }
    }

    fn consume_semicolon(&mut self) {
        self.eat(&Token::Semicolon);
    }

    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.prev_span)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Run a recursive production one nesting level deeper
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.nesting >= MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                ParseErrorKind::NestingTooDeep(MAX_NESTING_DEPTH),
                self.peek_span(),
            ));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::Var | Token::Let | Token::Const) => {
                let (kind, decls) = self.parse_var_declarations()?;
                self.consume_semicolon();
                Ok(Stmt::Var(kind, decls))
            }
            Some(Token::Function) => {
                let def = self.parse_function(true)?;
                Ok(Stmt::Function(def))
            }
            Some(Token::Return) => self.parse_return(),
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::For) => self.parse_for(),
            Some(Token::Break) => self.parse_jump(Token::Break, "break", Stmt::Break),
            Some(Token::Continue) => self.parse_jump(Token::Continue, "continue", Stmt::Continue),
            Some(Token::Throw) => {
                self.advance();
                let argument = self.parse_expression()?;
                self.consume_semicolon();
                Ok(Stmt::Throw(argument))
            }
            Some(Token::Try) => self.parse_try(),
            Some(Token::LeftBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(Token::Semicolon) => {
                self.advance();
                Ok(Stmt::Empty)
            }
            Some(_) => {
                let expr = self.parse_expression()?;
                self.consume_semicolon();
                Ok(Stmt::Expr(expr))
            }
            None => Err(self.unexpected("statement")),
        }
    }

    fn parse_var_kind(&mut self) -> Result<VarKind, ParseError> {
        match self.advance() {
            Some(Token::Var) => Ok(VarKind::Var),
            Some(Token::Let) => Ok(VarKind::Let),
            Some(Token::Const) => Ok(VarKind::Const),
            _ => Err(self.unexpected("declaration")),
        }
    }

    fn parse_var_declarations(&mut self) -> Result<(VarKind, Vec<VarDecl>), ParseError> {
        let kind = self.parse_var_kind()?;
        let mut decls = Vec::new();
        loop {
            let name = self.expect_ident("binding name")?;
            let init = if self.eat(&Token::Equal) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            decls.push(VarDecl { name, init });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok((kind, decls))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&Token::LeftBrace, "`{`")?;
        let mut body = Vec::new();
        while !self.check(&Token::RightBrace) {
            if self.at_end() {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_function(&mut self, declaration: bool) -> Result<Rc<FunctionDef>, ParseError> {
        let start = self.expect(&Token::Function, "`function`")?;
        let name = if declaration || matches!(self.peek(), Some(Token::Ident(_))) {
            Some(self.expect_ident("function name")?)
        } else {
            None
        };

        self.expect(&Token::LeftParen, "`(`")?;
        let mut params = Vec::new();
        while !self.check(&Token::RightParen) {
            params.push(self.expect_ident("parameter name")?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightParen, "`)`")?;

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = saved_loops;

        Ok(Rc::new(FunctionDef {
            name,
            params,
            body: body?,
            span: self.span_from(start),
        }))
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        if self.function_depth == 0 {
            return Err(ParseError::new(ParseErrorKind::StrayReturn, self.prev_span));
        }
        let argument = match self.peek() {
            None | Some(Token::Semicolon) | Some(Token::RightBrace) => None,
            Some(_) => Some(self.parse_expression()?),
        };
        self.consume_semicolon();
        Ok(Stmt::Return(argument))
    }

    fn parse_jump(
        &mut self,
        token: Token,
        name: &'static str,
        stmt: Stmt,
    ) -> Result<Stmt, ParseError> {
        self.expect(&token, name)?;
        if self.loop_depth == 0 {
            return Err(ParseError::new(ParseErrorKind::StrayJump(name), self.prev_span));
        }
        self.consume_semicolon();
        Ok(stmt)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(&Token::LeftParen, "`(`")?;
        let test = self.parse_expression()?;
        self.expect(&Token::RightParen, "`)`")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_loop_body(&mut self) -> Result<Box<Stmt>, ParseError> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        Ok(Box::new(body?))
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(&Token::LeftParen, "`(`")?;
        let test = self.parse_expression()?;
        self.expect(&Token::RightParen, "`)`")?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::While { test, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(&Token::LeftParen, "`(`")?;

        let declared = matches!(self.peek(), Some(Token::Var | Token::Let | Token::Const));
        let offset = usize::from(declared);
        let is_for_in = matches!(self.peek_at(offset), Some(Token::Ident(_)))
            && self.peek_at(offset + 1) == Some(&Token::In);

        if is_for_in {
            let kind = if declared {
                Some(self.parse_var_kind()?)
            } else {
                None
            };
            let name = self.expect_ident("loop binding")?;
            self.expect(&Token::In, "`in`")?;
            let object = self.parse_expression()?;
            self.expect(&Token::RightParen, "`)`")?;
            let body = self.parse_loop_body()?;
            return Ok(Stmt::ForIn {
                kind,
                name,
                object,
                body,
            });
        }

        let init = if self.check(&Token::Semicolon) {
            None
        } else if declared {
            let (kind, decls) = self.parse_var_declarations()?;
            Some(ForInit::Var(kind, decls))
        } else {
            Some(ForInit::Expr(self.parse_expression()?))
        };
        self.expect(&Token::Semicolon, "`;`")?;

        let test = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::Semicolon, "`;`")?;

        let update = if self.check(&Token::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::RightParen, "`)`")?;

        let body = self.parse_loop_body()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let block = self.parse_block()?;

        let mut param = None;
        let mut handler = None;
        if self.eat(&Token::Catch) {
            if self.eat(&Token::LeftParen) {
                param = Some(self.expect_ident("catch binding")?);
                self.expect(&Token::RightParen, "`)`")?;
            }
            handler = Some(self.parse_block()?);
        }

        let finalizer = if self.eat(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("`catch` or `finally`"));
        }

        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Parse a full expression
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let target = self.parse_conditional()?;

        let op = match self.peek() {
            Some(Token::Equal) => AssignOp::Assign,
            Some(Token::PlusEqual) => AssignOp::AddAssign,
            Some(Token::MinusEqual) => AssignOp::SubAssign,
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidAssignmentTarget,
                target.span,
            ));
        }
        self.advance();

        let value = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            self.span_from(start),
        ))
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let test = self.parse_binary(LogicalOp::Or.precedence())?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }

        let consequent = self.parse_assignment()?;
        self.expect(&Token::Colon, "`:`")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            self.span_from(start),
        ))
    }

    fn peek_infix(&self) -> Option<Infix> {
        let infix = match self.peek()? {
            Token::PipePipe => Infix::Logical(LogicalOp::Or),
            Token::AmpAmp => Infix::Logical(LogicalOp::And),
            Token::EqualEqual => Infix::Binary(BinaryOp::Eq),
            Token::BangEqual => Infix::Binary(BinaryOp::NotEq),
            Token::EqualEqualEqual => Infix::Binary(BinaryOp::StrictEq),
            Token::BangEqualEqual => Infix::Binary(BinaryOp::StrictNotEq),
            Token::Less => Infix::Binary(BinaryOp::Lt),
            Token::LessEqual => Infix::Binary(BinaryOp::LtEq),
            Token::Greater => Infix::Binary(BinaryOp::Gt),
            Token::GreaterEqual => Infix::Binary(BinaryOp::GtEq),
            Token::In => Infix::Binary(BinaryOp::In),
            Token::Instanceof => Infix::Binary(BinaryOp::Instanceof),
            Token::Plus => Infix::Binary(BinaryOp::Add),
            Token::Minus => Infix::Binary(BinaryOp::Sub),
            Token::Star => Infix::Binary(BinaryOp::Mul),
            Token::Slash => Infix::Binary(BinaryOp::Div),
            Token::Percent => Infix::Binary(BinaryOp::Rem),
            _ => return None,
        };
        Some(infix)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let mut left = self.parse_unary()?;

        while let Some(infix) = self.peek_infix() {
            let precedence = infix.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = Box::new(self.parse_binary(precedence + 1)?);
            let left_box = Box::new(left);
            let kind = match infix {
                Infix::Binary(op) => ExprKind::Binary {
                    op,
                    left: left_box,
                    right,
                },
                Infix::Logical(op) => ExprKind::Logical {
                    op,
                    left: left_box,
                    right,
                },
            };
            left = Expr::new(kind, self.span_from(start));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Typeof) => UnaryOp::Typeof,
            Some(Token::Void) => UnaryOp::Void,
            Some(Token::Delete) => UnaryOp::Delete,
            Some(Token::PlusPlus | Token::MinusMinus) => return self.parse_prefix_update(),
            _ => return self.parse_postfix(),
        };
        self.advance();

        let argument = self.nested(Self::parse_unary)?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                argument: Box::new(argument),
            },
            self.span_from(start),
        ))
    }

    fn parse_prefix_update(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let op = match self.advance() {
            Some(Token::PlusPlus) => UpdateOp::Increment,
            _ => UpdateOp::Decrement,
        };
        let target = self.nested(Self::parse_unary)?;
        if !target.is_assignable() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidAssignmentTarget,
                target.span,
            ));
        }
        Ok(Expr::new(
            ExprKind::Update {
                op,
                prefix: true,
                target: Box::new(target),
            },
            self.span_from(start),
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let expr = self.parse_call_member()?;

        let op = match self.peek() {
            Some(Token::PlusPlus) => UpdateOp::Increment,
            Some(Token::MinusMinus) => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        if !expr.is_assignable() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidAssignmentTarget,
                expr.span,
            ));
        }
        self.advance();
        Ok(Expr::new(
            ExprKind::Update {
                op,
                prefix: false,
                target: Box::new(expr),
            },
            self.span_from(start),
        ))
    }

    fn parse_call_member(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let mut expr = if self.check(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            match self.peek() {
                Some(Token::Dot | Token::LeftBracket) => {
                    expr = self.parse_member_suffix(expr, start)?;
                }
                Some(Token::LeftParen) => {
                    let args = self.parse_arguments()?;
                    expr = Expr::call(expr, args, self.span_from(start));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&Token::New, "`new`")?;
        let mut callee = if self.check(&Token::New) {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };
        while matches!(self.peek(), Some(Token::Dot | Token::LeftBracket)) {
            callee = self.parse_member_suffix(callee, start)?;
        }
        let args = if self.check(&Token::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            self.span_from(start),
        ))
    }

    fn parse_member_suffix(&mut self, object: Expr, start: Span) -> Result<Expr, ParseError> {
        if self.eat(&Token::Dot) {
            let name = self.parse_property_name()?;
            Ok(Expr::named_member(object, &name, self.span_from(start)))
        } else {
            self.expect(&Token::LeftBracket, "`[`")?;
            let key = self.parse_expression()?;
            self.expect(&Token::RightBracket, "`]`")?;
            Ok(Expr::computed_member(object, key, self.span_from(start)))
        }
    }

    /// Identifier name after `.` (keywords allowed)
    fn parse_property_name(&mut self) -> Result<String, ParseError> {
        if let Some(name) = self.peek().and_then(keyword_name) {
            self.advance();
            return Ok(name.to_string());
        }
        self.expect_ident("property name")
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&Token::LeftParen, "`(`")?;
        let mut args = Vec::new();
        while !self.check(&Token::RightParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightParen, "`)`")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let kind = match self.peek() {
            Some(Token::Function) => {
                let def = self.parse_function(false)?;
                return Ok(Expr::new(ExprKind::Function(def), self.span_from(start)));
            }
            Some(Token::LeftBrace) => return self.parse_object(),
            Some(Token::LeftBracket) => return self.parse_array(),
            Some(Token::LeftParen) => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&Token::RightParen, "`)`")?;
                return Ok(inner);
            }
            _ => match self.advance() {
                Some(Token::Number(n)) => ExprKind::Number(n),
                Some(Token::String(s)) => ExprKind::Str(s),
                Some(Token::Ident(name)) => ExprKind::Ident(name),
                Some(Token::True) => ExprKind::Bool(true),
                Some(Token::False) => ExprKind::Bool(false),
                Some(Token::Null) => ExprKind::Null,
                Some(Token::This) => ExprKind::This,
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.unexpected("expression"));
                }
                None => return Err(self.unexpected("expression")),
            },
        };
        Ok(Expr::new(kind, start))
    }

    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&Token::LeftBracket, "`[`")?;
        let mut elements = Vec::new();
        while !self.check(&Token::RightBracket) {
            elements.push(self.parse_assignment()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightBracket, "`]`")?;
        Ok(Expr::new(ExprKind::Array(elements), self.span_from(start)))
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&Token::LeftBrace, "`{`")?;
        let mut properties: Vec<Property> = Vec::new();
        let mut seen_proto = false;

        while !self.check(&Token::RightBrace) {
            let key_span = self.peek_span();
            let key = match self.peek().cloned() {
                Some(Token::String(s)) => {
                    self.advance();
                    PropKey::Str(s)
                }
                Some(Token::Number(n)) => {
                    self.advance();
                    PropKey::Number(n)
                }
                Some(Token::LeftBracket) => {
                    self.advance();
                    let key = self.parse_assignment()?;
                    self.expect(&Token::RightBracket, "`]`")?;
                    PropKey::Computed(Box::new(key))
                }
                _ => PropKey::Ident(self.parse_property_name()?),
            };

            let value = if self.eat(&Token::Colon) {
                self.parse_assignment()?
            } else {
                // Shorthand `{ name }`
                match &key {
                    PropKey::Ident(name) if keyword_name_str(name).is_none() => {
                        Expr::ident(name, key_span)
                    }
                    _ => return Err(self.unexpected("`:`")),
                }
            };

            if key.static_name() == Some("__proto__") {
                if seen_proto {
                    return Err(ParseError::new(ParseErrorKind::DuplicateProto, key_span));
                }
                seen_proto = true;
            }

            properties.push(Property {
                key,
                value,
                span: key_span,
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        self.expect(&Token::RightBrace, "`}`")?;
        Ok(Expr::new(ExprKind::Object(properties), self.span_from(start)))
    }
}

/// Binary or logical infix operator
#[derive(Debug, Clone, Copy)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

impl Infix {
    fn precedence(&self) -> u8 {
        match self {
            Infix::Binary(op) => op.precedence(),
            Infix::Logical(op) => op.precedence(),
        }
    }
}

/// Spelling of a keyword token usable as a property name
fn keyword_name(token: &Token) -> Option<&'static str> {
    let name = match token {
        Token::Var => "var",
        Token::Let => "let",
        Token::Const => "const",
        Token::Function => "function",
        Token::Return => "return",
        Token::If => "if",
        Token::Else => "else",
        Token::While => "while",
        Token::For => "for",
        Token::In => "in",
        Token::Break => "break",
        Token::Continue => "continue",
        Token::Throw => "throw",
        Token::Try => "try",
        Token::Catch => "catch",
        Token::Finally => "finally",
        Token::New => "new",
        Token::This => "this",
        Token::Typeof => "typeof",
        Token::Void => "void",
        Token::Delete => "delete",
        Token::Instanceof => "instanceof",
        Token::True => "true",
        Token::False => "false",
        Token::Null => "null",
        _ => return None,
    };
    Some(name)
}

/// Is `name` spelled like a keyword?
pub(crate) fn keyword_name_str(name: &str) -> Option<&'static str> {
    use logos::Logos;
    let mut lexer = Token::lexer(name);
    match (lexer.next(), lexer.next()) {
        (Some(Ok(token)), None) => keyword_name(&token),
        _ => None,
    }
}

fn end_position(source: &str) -> (u32, u32) {
    let mut line = 1u32;
    let mut column = 1u32;
    for c in source.chars() {
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        match parse(source).unwrap().body.remove(0) {
            Stmt::Expr(e) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        for source in [
            "[".repeat(100_000),
            format!("x = {}1", "!".repeat(100_000)),
            format!("{}x{}", "(".repeat(100_000), ")".repeat(100_000)),
            "{".repeat(100_000),
            format!("x = {}F", "new ".repeat(100_000)),
        ] {
            let err = parse(&source).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::NestingTooDeep(MAX_NESTING_DEPTH));
        }
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let source = format!("x = {}1{};", "[".repeat(40), "]".repeat(40));
        assert!(parse(&source).is_ok());

        let source = format!("{}x = 1;{}", "{ ".repeat(40), " }".repeat(40));
        assert!(parse(&source).is_ok());
    }

    #[test]
    fn test_static_member_access() {
        let e = expr("obj.__proto__");
        match e.kind {
            ExprKind::Member {
                property: MemberProp::Named(name),
                ..
            } => assert_eq!(name, "__proto__"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_computed_member_access() {
        let e = expr("obj['__' + 'proto__']");
        assert!(matches!(
            e.kind,
            ExprKind::Member {
                property: MemberProp::Computed(_),
                ..
            }
        ));
    }

    #[test]
    fn test_precedence() {
        let e = expr("a + b * c === d || e");
        let ExprKind::Logical { op, left, .. } = e.kind else {
            panic!("expected logical");
        };
        assert_eq!(op, LogicalOp::Or);
        let ExprKind::Binary { op, left, .. } = left.kind else {
            panic!("expected equality");
        };
        assert_eq!(op, BinaryOp::StrictEq);
        assert!(matches!(
            left.kind,
            ExprKind::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_new_with_member_callee() {
        let e = expr("new a.B(1).c");
        let ExprKind::Member { object, .. } = e.kind else {
            panic!("expected member");
        };
        let ExprKind::New { callee, args } = object.kind else {
            panic!("expected new");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(callee.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn test_for_in_and_for() {
        let program = parse(
            "for (const k in src) { t[k] = src[k]; }
             for (var i = 0; i < 3; i++) {}",
        )
        .unwrap();

        assert!(matches!(program.body[0], Stmt::ForIn { kind: Some(VarKind::Const), .. }));
        assert!(matches!(program.body[1], Stmt::For { init: Some(ForInit::Var(..)), .. }));
    }

    #[test]
    fn test_object_literal_keys() {
        let e = expr("({ a: 1, 'b': 2, 3: 4, [k]: 5, __proto__: p, short, delete: 6 })");
        let ExprKind::Object(props) = e.kind else {
            panic!("expected object");
        };
        assert_eq!(props.len(), 7);
        assert!(matches!(props[3].key, PropKey::Computed(_)));
        assert_eq!(props[4].key.static_name(), Some("__proto__"));
        assert!(matches!(props[5].value.kind, ExprKind::Ident(ref n) if n == "short"));
    }

    #[test]
    fn test_duplicate_proto_rejected() {
        let err = parse("x = { __proto__: a, '__proto__': b }").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateProto);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("f() = 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidAssignmentTarget);
    }

    #[test]
    fn test_stray_jumps() {
        assert_eq!(parse("break;").unwrap_err().kind, ParseErrorKind::StrayJump("break"));
        assert_eq!(parse("return 1;").unwrap_err().kind, ParseErrorKind::StrayReturn);
        assert!(parse("while (x) { function f() { return 1; } break; }").is_ok());
        assert!(parse("while (x) { function f() { break; } }").is_err());
    }

    #[test]
    fn test_try_requires_handler() {
        assert!(parse("try {} catch (e) {}").is_ok());
        assert!(parse("try {} finally {}").is_ok());
        assert!(parse("try {}").is_err());
    }

    #[test]
    fn test_unexpected_eof() {
        let err = parse("a.").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEof(_)));
    }

    #[test]
    fn test_spans() {
        let e = expr("  foo.constructor");
        assert_eq!(e.span.start, 2);
        assert_eq!(e.span.end, 17);
        assert_eq!(e.span.column, 3);
    }
}
