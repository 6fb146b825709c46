/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Precedence-climbing parser for `utils:eval` expressions.

use super::ast::{BinaryOp, Expr, Literal, LogicalOp, Property, UnaryOp};
use super::lexer::{Token, tokenize};
use crate::error::EvalError;
use std::rc::Rc;

static EOF: Token = Token::Eof;

/// Parse a complete expression. Empty input parses to `None`.
pub fn parse(source: &str) -> Result<Option<Expr>, EvalError> {
    let tokens = tokenize(source)?;
    if matches!(tokens.first(), None | Some(Token::Eof)) {
        return Ok(None);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        Token::Eof => Ok(Some(expr)),
        other => Err(unexpected(other)),
    }
}

#[derive(Clone, Copy)]
enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Binding power of an infix operator token; higher binds tighter.
fn infix(token: &Token) -> Option<(u8, Operator)> {
    let Token::Punct(p) = token else {
        return None;
    };
    let op = match *p {
        "??" => (1, Operator::Logical(LogicalOp::Nullish)),
        "||" => (1, Operator::Logical(LogicalOp::Or)),
        "&&" => (2, Operator::Logical(LogicalOp::And)),
        "==" => (3, Operator::Binary(BinaryOp::Eq)),
        "!=" => (3, Operator::Binary(BinaryOp::NotEq)),
        "===" => (3, Operator::Binary(BinaryOp::StrictEq)),
        "!==" => (3, Operator::Binary(BinaryOp::StrictNotEq)),
        "<" => (4, Operator::Binary(BinaryOp::Lt)),
        ">" => (4, Operator::Binary(BinaryOp::Gt)),
        "<=" => (4, Operator::Binary(BinaryOp::Le)),
        ">=" => (4, Operator::Binary(BinaryOp::Ge)),
        "+" => (5, Operator::Binary(BinaryOp::Add)),
        "-" => (5, Operator::Binary(BinaryOp::Sub)),
        "*" => (6, Operator::Binary(BinaryOp::Mul)),
        "/" => (6, Operator::Binary(BinaryOp::Div)),
        "%" => (6, Operator::Binary(BinaryOp::Rem)),
        _ => return None,
    };
    Some(op)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => n.to_string(),
        Token::String(s) => format!("'{s}'"),
        Token::Ident(name) => name.clone(),
        Token::Punct(p) => (*p).to_string(),
        Token::Eof => "end of input".to_string(),
    }
}

fn unexpected(token: &Token) -> EvalError {
    match token {
        Token::Eof => EvalError::Syntax("Unexpected end of input".to_string()),
        other => EvalError::Syntax(format!("Unexpected token '{}'", describe(other))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&EOF)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Token::Punct(q) if *q == p)
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, p: &str) -> Result<(), EvalError> {
        if self.eat(p) {
            Ok(())
        } else {
            Err(unexpected(self.peek()))
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, EvalError> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }

        let test = self.parse_binary(1)?;
        if !self.eat("?") {
            return Ok(test);
        }
        let consequent = self.parse_expression()?;
        self.expect(":")?;
        let alternate = self.parse_expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn try_parse_arrow(&mut self) -> Result<Option<Expr>, EvalError> {
        let params = match self.peek() {
            Token::Ident(name) if matches!(self.peek_at(1), Token::Punct("=>")) => {
                let params = vec![name.clone()];
                self.pos += 1;
                params
            }
            Token::Punct("(") => {
                let Some(close) = self.matching_paren() else {
                    return Ok(None);
                };
                if !matches!(self.tokens.get(close + 1), Some(Token::Punct("=>"))) {
                    return Ok(None);
                }
                self.pos += 1;
                let mut params = Vec::new();
                while !self.eat(")") {
                    match self.advance() {
                        Token::Ident(name) => params.push(name),
                        other => return Err(unexpected(&other)),
                    }
                    if !self.is_punct(")") {
                        self.expect(",")?;
                    }
                }
                params
            }
            _ => return Ok(None),
        };

        self.expect("=>")?;
        let body = self.parse_expression()?;
        Ok(Some(Expr::Arrow {
            params,
            body: Rc::new(body),
        }))
    }

    /// Index of the `)` closing the `(` at the current position.
    fn matching_paren(&self) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(self.pos) {
            match token {
                Token::Punct("(") => depth += 1,
                Token::Punct(")") => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn parse_binary(&mut self, min_power: u8) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;

        while let Some((power, operator)) = infix(self.peek()) {
            if power < min_power {
                break;
            }
            self.pos += 1;
            let right = Box::new(self.parse_binary(power + 1)?);
            let left_box = Box::new(left);
            left = match operator {
                Operator::Binary(op) => Expr::Binary {
                    op,
                    left: left_box,
                    right,
                },
                Operator::Logical(op) => Expr::Logical {
                    op,
                    left: left_box,
                    right,
                },
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Token::Punct("!") => UnaryOp::Not,
            Token::Punct("-") => UnaryOp::Neg,
            Token::Punct("+") => UnaryOp::Plus,
            Token::Ident(name) if name == "typeof" => UnaryOp::TypeOf,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat(".") {
                let name = self.property_name()?;
                expr = member(expr, Property::Named(name), false);
            } else if self.eat("?.") {
                if self.eat("(") {
                    let args = self.parse_arguments()?;
                    expr = call(expr, args, true);
                } else if self.eat("[") {
                    let index = self.parse_expression()?;
                    self.expect("]")?;
                    expr = member(expr, Property::Computed(Box::new(index)), true);
                } else {
                    let name = self.property_name()?;
                    expr = member(expr, Property::Named(name), true);
                }
            } else if self.eat("[") {
                let index = self.parse_expression()?;
                self.expect("]")?;
                expr = member(expr, Property::Computed(Box::new(index)), false);
            } else if self.eat("(") {
                let args = self.parse_arguments()?;
                expr = call(expr, args, false);
            } else {
                return Ok(expr);
            }
        }
    }

    fn property_name(&mut self) -> Result<String, EvalError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(unexpected(&other)),
        }
    }

    /// Arguments after an opening `(`, through the closing `)`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        while !self.eat(")") {
            args.push(self.parse_expression()?);
            if !self.is_punct(")") {
                self.expect(",")?;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::String(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                "undefined" => Expr::Literal(Literal::Undefined),
                _ => Expr::Ident(name),
            }),
            Token::Punct("(") => {
                let expr = self.parse_expression()?;
                self.expect(")")?;
                Ok(expr)
            }
            Token::Punct("[") => {
                let mut items = Vec::new();
                while !self.eat("]") {
                    items.push(self.parse_expression()?);
                    if !self.is_punct("]") {
                        self.expect(",")?;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::Punct("{") => self.parse_object(),
            other => Err(unexpected(&other)),
        }
    }

    /// Object literal members after the opening `{`.
    fn parse_object(&mut self) -> Result<Expr, EvalError> {
        let mut members = Vec::new();
        while !self.eat("}") {
            let (key, shorthand) = match self.advance() {
                Token::Ident(name) => (name, true),
                Token::String(s) => (s, false),
                Token::Number(n) => (crate::value::format_number(n), false),
                other => return Err(unexpected(&other)),
            };

            let value = if self.eat(":") {
                self.parse_expression()?
            } else if shorthand {
                Expr::Ident(key.clone())
            } else {
                return Err(unexpected(self.peek()));
            };
            members.push((key, value));

            if !self.is_punct("}") {
                self.expect(",")?;
            }
        }
        Ok(Expr::Object(members))
    }
}

fn member(object: Expr, property: Property, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property,
        optional,
    }
}

fn call(callee: Expr, args: Vec<Expr>, optional: bool) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args,
        optional,
    }
}
