//! Arithmetic for `expression(...)` template fields.
//!
//! Grammar: numbers, identifiers, `+ - * / %`, unary minus and parentheses.

use crate::errors::ExprError;
use std::collections::HashMap;

/// Nesting limit for parentheses and unary operators.
pub const MAX_EXPR_DEPTH: usize = 64;

/// Token limit for one expression. Bounds the tree the evaluator walks.
pub const MAX_EXPR_TOKENS: usize = 512;

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn lex(input: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if out.len() >= MAX_EXPR_TOKENS {
            return Err(ExprError::new(start, "expression too long"));
        }

        if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let v: f64 = input[start..i]
                .parse()
                .map_err(|_| ExprError::new(start, "invalid number"))?;
            out.push(Token {
                kind: TokenKind::Number(v),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            out.push(Token {
                kind: TokenKind::Ident(input[start..i].to_owned()),
                offset: start,
            });
            continue;
        }

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            _ => return Err(ExprError::new(start, format!("unexpected character '{c}'"))),
        };
        i += 1;
        out.push(Token { kind, offset: start });
    }

    out.push(Token {
        kind: TokenKind::Eof,
        offset: input.len(),
    });
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var(String, usize),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let offset = self.bump().offset;
            let r = self.parse_factor()?;
            e = Expr::Binary(op, Box::new(e), Box::new(r), offset);
        }
        Ok(e)
    }

    fn parse_factor(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let offset = self.bump().offset;
            let r = self.parse_unary()?;
            e = Expr::Binary(op, Box::new(e), Box::new(r), offset);
        }
        Ok(e)
    }

    // Every nested `(` and unary sign passes through here.
    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.depth >= MAX_EXPR_DEPTH {
            return Err(ExprError::new(self.peek().offset, "expression nested too deeply"));
        }
        self.depth += 1;
        let e = match self.peek().kind {
            TokenKind::Minus => {
                self.bump();
                self.parse_unary().map(|inner| Expr::Neg(Box::new(inner)))
            }
            TokenKind::Plus => {
                self.bump();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        };
        self.depth -= 1;
        e
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let t = self.bump();
        match t.kind {
            TokenKind::Number(v) => Ok(Expr::Num(v)),
            TokenKind::Ident(name) => Ok(Expr::Var(name, t.offset)),
            TokenKind::LParen => {
                let e = self.parse_term()?;
                let close = self.bump();
                if close.kind != TokenKind::RParen {
                    return Err(ExprError::new(close.offset, "expected ')'"));
                }
                Ok(e)
            }
            other => Err(ExprError::new(t.offset, format!("unexpected token {other:?}"))),
        }
    }
}

fn parse(src: &str) -> Result<Expr, ExprError> {
    let mut p = Parser {
        tokens: lex(src)?,
        pos: 0,
        depth: 0,
    };
    let e = p.parse_term()?;
    let t = p.peek();
    if t.kind != TokenKind::Eof {
        return Err(ExprError::new(t.offset, format!("unexpected trailing {:?}", t.kind)));
    }
    Ok(e)
}

fn eval(e: &Expr, vars: &HashMap<String, f64>) -> Result<f64, ExprError> {
    match e {
        Expr::Num(v) => Ok(*v),
        Expr::Var(name, offset) => vars
            .get(name)
            .copied()
            .ok_or_else(|| ExprError::new(*offset, format!("unknown variable '{name}'"))),
        Expr::Neg(inner) => Ok(-eval(inner, vars)?),
        Expr::Binary(op, l, r, offset) => {
            let (l, r) = (eval(l, vars)?, eval(r, vars)?);
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div | BinaryOp::Mod if r == 0.0 => {
                    Err(ExprError::new(*offset, "division by zero"))
                }
                BinaryOp::Div => Ok(l / r),
                BinaryOp::Mod => Ok(l % r),
            }
        }
    }
}

/// Evaluates `src` against numeric variables.
pub fn evaluate(src: &str, vars: &HashMap<String, f64>) -> Result<f64, ExprError> {
    let v = eval(&parse(src)?, vars)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ExprError::new(0, "result is not a finite number"))
    }
}

/// The inner source of an `expression(...)` literal.
pub fn expression_body(s: &str) -> Option<&str> {
    s.trim()
        .strip_prefix("expression(")?
        .strip_suffix(')')
}
