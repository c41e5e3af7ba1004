// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Pratt parser for C++ expressions.
//!
//! Casts make the C++ grammar context sensitive: `(T) * p` is a cast when
//! `T` names a type and a multiplication otherwise. The parser therefore
//! takes a type lookup callback and backtracks when a parenthesized type
//! name turns out not to be one.

use crate::{
    bail, eval_err,
    error::Result,
    eval::{
        ast::{BinaryOp, CastKind, Declarator, Expr, ExprKind, Span, TypeName, UnaryOp},
        lexer::{tokenize, Token, TokenKind},
    },
};

/// Words that make up fundamental type names
const BUILTIN_TYPE_WORDS: &[&str] = &[
    "void", "bool", "char", "wchar_t", "char16_t", "char32_t", "short", "int", "long", "signed",
    "unsigned", "float", "double", "__int128",
];

/// Bracket, operator and template nesting accepted before parsing fails
pub const MAX_NESTING_DEPTH: usize = 256;

const COMMA_BP: u8 = 1;
const ASSIGN_BP: u8 = 2;
const CONDITIONAL_BP: u8 = 3;

fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
    let TokenKind::Punct(punct) = token.kind else {
        return None;
    };
    let op = match punct {
        "," => (BinaryOp::Comma, COMMA_BP),
        "||" => (BinaryOp::LogicalOr, 4),
        "&&" => (BinaryOp::LogicalAnd, 5),
        "|" => (BinaryOp::BitOr, 6),
        "^" => (BinaryOp::BitXor, 7),
        "&" => (BinaryOp::BitAnd, 8),
        "==" => (BinaryOp::Eq, 9),
        "!=" => (BinaryOp::Ne, 9),
        "<" => (BinaryOp::Lt, 10),
        ">" => (BinaryOp::Gt, 10),
        "<=" => (BinaryOp::Le, 10),
        ">=" => (BinaryOp::Ge, 10),
        "<<" => (BinaryOp::Shl, 11),
        ">>" => (BinaryOp::Shr, 11),
        "+" => (BinaryOp::Add, 12),
        "-" => (BinaryOp::Sub, 12),
        "*" => (BinaryOp::Mul, 13),
        "/" => (BinaryOp::Div, 13),
        "%" => (BinaryOp::Rem, 13),
        _ => return None,
    };
    Some(op)
}

fn assignment_op(token: &Token) -> Option<Option<BinaryOp>> {
    let TokenKind::Punct(punct) = token.kind else {
        return None;
    };
    let op = match punct {
        "=" => None,
        "+=" => Some(BinaryOp::Add),
        "-=" => Some(BinaryOp::Sub),
        "*=" => Some(BinaryOp::Mul),
        "/=" => Some(BinaryOp::Div),
        "%=" => Some(BinaryOp::Rem),
        "<<=" => Some(BinaryOp::Shl),
        ">>=" => Some(BinaryOp::Shr),
        "&=" => Some(BinaryOp::BitAnd),
        "^=" => Some(BinaryOp::BitXor),
        "|=" => Some(BinaryOp::BitOr),
        _ => return None,
    };
    Some(op)
}

/// Parse `source` into an expression tree. `is_type` tells whether a
/// (possibly qualified, possibly templated) name denotes a type.
pub fn parse_expression(source: &str, is_type: &dyn Fn(&str) -> bool) -> Result<Expr> {
    let mut parser =
        Parser { tokens: tokenize(source)?, pos: 0, splits: Vec::new(), depth: 0, is_type };
    let expr = parser.parse_expr(COMMA_BP)?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        bail!(ParseError, "unexpected token at position {}", trailing.span.start);
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    /// `>>` tokens split into two `>`, with the original token
    splits: Vec<(usize, Token)>,
    depth: usize,
    is_type: &'a dyn Fn(&str) -> bool,
}

#[derive(Clone, Copy)]
struct Checkpoint {
    pos: usize,
    splits: usize,
}

impl Parser<'_> {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint { pos: self.pos, splits: self.splits.len() }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        while self.splits.len() > checkpoint.splits {
            if let Some((index, original)) = self.splits.pop() {
                self.tokens.remove(index + 1);
                self.tokens[index] = original;
            }
        }
        self.pos = checkpoint.pos;
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.peek().is_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<Span> {
        let token = self.peek();
        if token.is_punct(punct) {
            Ok(self.bump().span)
        } else {
            Err(eval_err!(ParseError, "expected '{}' at position {}", punct, token.span.start))
        }
    }

    /// Consume a `>` closing a template argument list, splitting `>>`
    fn expect_closing_angle(&mut self) -> Result<Span> {
        let token = self.peek().clone();
        if token.is_punct(">>") {
            let (start, end) = (token.span.start, token.span.end);
            self.tokens[self.pos] = Token { kind: TokenKind::Punct(">"), span: Span::new(start, start + 1) };
            self.tokens
                .insert(self.pos + 1, Token { kind: TokenKind::Punct(">"), span: Span::new(start + 1, end) });
            self.splits.push((self.pos, token));
        }
        self.expect_punct(">")
    }

    fn expect_word(&mut self) -> Result<(String, Span)> {
        let token = self.bump();
        match token.kind {
            TokenKind::Word(word) => Ok((word, token.span)),
            _ => bail!(ParseError, "expected an identifier at position {}", token.span.start),
        }
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            bail!(
                ParseError,
                "expression nested deeper than {} levels at position {}",
                MAX_NESTING_DEPTH,
                self.peek().span.start
            );
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr> {
        self.nested(|parser| parser.parse_binary(min_bp))
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let token = self.peek().clone();

            if let Some(op) = assignment_op(&token) {
                if ASSIGN_BP < min_bp {
                    break;
                }
                self.bump();
                let rhs = self.parse_expr(ASSIGN_BP)?;
                let span = lhs.span.to(rhs.span);
                lhs = Expr::new(ExprKind::Assign { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
                continue;
            }

            if token.is_punct("?") {
                if CONDITIONAL_BP < min_bp {
                    break;
                }
                self.bump();
                let then = self.parse_expr(COMMA_BP)?;
                self.expect_punct(":")?;
                let otherwise = self.parse_expr(ASSIGN_BP)?;
                let span = lhs.span.to(otherwise.span);
                lhs = Expr::new(
                    ExprKind::Conditional {
                        cond: Box::new(lhs),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    },
                    span,
                );
                continue;
            }

            let Some((op, bp)) = binary_op(&token) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_expr(bp + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.nested(Self::parse_prefix)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let prefix = match token.kind {
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("-") => Some(UnaryOp::Minus),
            TokenKind::Punct("!") => Some(UnaryOp::LogicalNot),
            TokenKind::Punct("~") => Some(UnaryOp::BitNot),
            TokenKind::Punct("*") => Some(UnaryOp::Deref),
            TokenKind::Punct("&") => Some(UnaryOp::AddressOf),
            TokenKind::Punct("++") => Some(UnaryOp::PreInc),
            TokenKind::Punct("--") => Some(UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = prefix {
            self.bump();
            let operand = self.parse_unary()?;
            let span = token.span.to(operand.span);
            return Ok(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, span));
        }

        if token.is_word("sizeof") {
            self.bump();
            if self.peek().is_punct("(") {
                let saved = self.checkpoint();
                self.bump();
                if let Some(ty) = self.try_parse_type_name()? {
                    if self.peek().is_punct(")") {
                        let end = self.bump().span;
                        return Ok(Expr::new(ExprKind::SizeOfType(ty), token.span.to(end)));
                    }
                }
                self.restore(saved);
            }
            let operand = self.parse_unary()?;
            let span = token.span.to(operand.span);
            return Ok(Expr::new(ExprKind::SizeOfExpr(Box::new(operand)), span));
        }

        if token.is_punct("(") {
            let saved = self.checkpoint();
            self.bump();
            if let Some(ty) = self.try_parse_type_name()? {
                if self.eat_punct(")") {
                    let operand = self.parse_unary()?;
                    let span = token.span.to(operand.span);
                    return Ok(Expr::new(
                        ExprKind::Cast { kind: CastKind::CStyle, ty, operand: Box::new(operand) },
                        span,
                    ));
                }
            }
            self.restore(saved);
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Punct("[") => {
                    self.bump();
                    let index = self.parse_expr(COMMA_BP)?;
                    let end = self.expect_punct("]")?;
                    let span = expr.span.to(end);
                    expr = Expr::new(
                        ExprKind::Index { base: Box::new(expr), index: Box::new(index) },
                        span,
                    );
                }
                TokenKind::Punct(punct @ ("." | "->")) => {
                    self.bump();
                    let (member, member_span) = self.expect_word()?;
                    let span = expr.span.to(member_span);
                    expr = Expr::new(
                        ExprKind::Member { base: Box::new(expr), member, arrow: punct == "->" },
                        span,
                    );
                }
                TokenKind::Punct(punct @ ("++" | "--")) => {
                    self.bump();
                    let op = if punct == "++" { UnaryOp::PostInc } else { UnaryOp::PostDec };
                    let span = expr.span.to(token.span);
                    expr = Expr::new(ExprKind::Unary { op, operand: Box::new(expr) }, span);
                }
                TokenKind::Punct("(") => {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.peek().is_punct(")") {
                        loop {
                            args.push(self.parse_expr(ASSIGN_BP)?);
                            if !self.eat_punct(",") {
                                break;
                            }
                        }
                    }
                    let end = self.expect_punct(")")?;
                    let span = expr.span.to(end);
                    expr = Expr::new(ExprKind::Call { callee: Box::new(expr), args }, span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Integer { value, suffix, decimal } => {
                self.bump();
                Ok(Expr::new(ExprKind::IntegerLiteral { value, suffix, decimal }, token.span))
            }
            TokenKind::Float { value, suffix } => {
                self.bump();
                Ok(Expr::new(ExprKind::FloatLiteral { value, suffix }, token.span))
            }
            TokenKind::Char { value, ty } => {
                self.bump();
                Ok(Expr::new(ExprKind::CharLiteral { value, ty }, token.span))
            }
            TokenKind::Punct("(") => {
                self.bump();
                let inner = self.parse_expr(COMMA_BP)?;
                let end = self.expect_punct(")")?;
                Ok(Expr::new(inner.kind, token.span.to(end)))
            }
            TokenKind::Punct("::") => {
                self.bump();
                let (name, span) = self.parse_qualified_name()?;
                Ok(Expr::new(ExprKind::Identifier(name), token.span.to(span)))
            }
            TokenKind::Word(ref word) => match word.as_str() {
                "true" | "false" => {
                    self.bump();
                    Ok(Expr::new(ExprKind::BoolLiteral(word == "true"), token.span))
                }
                "nullptr" => {
                    self.bump();
                    Ok(Expr::new(ExprKind::NullPtr, token.span))
                }
                "this" => {
                    self.bump();
                    Ok(Expr::new(ExprKind::This, token.span))
                }
                "static_cast" | "reinterpret_cast" => {
                    self.bump();
                    let kind =
                        if word == "static_cast" { CastKind::Static } else { CastKind::Reinterpret };
                    self.expect_punct("<")?;
                    let ty = self.try_parse_type_name()?.ok_or_else(|| {
                        eval_err!(ParseError, "expected a type at position {}", self.peek().span.start)
                    })?;
                    self.expect_closing_angle()?;
                    self.expect_punct("(")?;
                    let operand = self.parse_expr(COMMA_BP)?;
                    let end = self.expect_punct(")")?;
                    Ok(Expr::new(ExprKind::Cast { kind, ty, operand: Box::new(operand) }, token.span.to(end)))
                }
                "const_cast" | "dynamic_cast" | "typeid" | "new" | "delete" | "throw" => {
                    bail!(ParseError, "'{}' is not supported (at position {})", word, token.span.start)
                }
                _ if BUILTIN_TYPE_WORDS.contains(&word.as_str()) => {
                    // Functional cast: `int(x)`
                    let ty = self.try_parse_type_name()?.ok_or_else(|| {
                        eval_err!(ParseError, "invalid type name at position {}", token.span.start)
                    })?;
                    self.expect_punct("(")?;
                    let operand = self.parse_expr(COMMA_BP)?;
                    let end = self.expect_punct(")")?;
                    Ok(Expr::new(
                        ExprKind::Cast { kind: CastKind::CStyle, ty, operand: Box::new(operand) },
                        token.span.to(end),
                    ))
                }
                _ => {
                    let (name, span) = self.parse_qualified_name()?;
                    Ok(Expr::new(ExprKind::Identifier(name), token.span.to(span)))
                }
            },
            TokenKind::Eof => bail!(ParseError, "unexpected end of expression"),
            _ => bail!(ParseError, "unexpected token at position {}", token.span.start),
        }
    }

    /// `a::b::c`
    fn parse_qualified_name(&mut self) -> Result<(String, Span)> {
        let (mut name, mut span) = self.expect_word()?;
        while self.peek().is_punct("::") && matches!(self.peek_at(1).kind, TokenKind::Word(_)) {
            self.bump();
            let (segment, segment_span) = self.expect_word()?;
            name.push_str("::");
            name.push_str(&segment);
            span = span.to(segment_span);
        }
        Ok((name, span))
    }

    /// Try to read a type name at the current position. On `None` the
    /// position is restored.
    fn try_parse_type_name(&mut self) -> Result<Option<TypeName>> {
        let saved = self.checkpoint();
        match self.nested(Self::parse_type_name_inner)? {
            Some(ty) => Ok(Some(ty)),
            None => {
                self.restore(saved);
                Ok(None)
            }
        }
    }

    fn skip_cv(&mut self) {
        while self.peek().is_word("const") || self.peek().is_word("volatile") {
            self.bump();
        }
    }

    fn parse_type_name_inner(&mut self) -> Result<Option<TypeName>> {
        self.skip_cv();

        let mut builtin_words = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Word(word) if BUILTIN_TYPE_WORDS.contains(&word.as_str()) => {
                    builtin_words.push(word.clone());
                    self.bump();
                }
                TokenKind::Word(word) if word == "const" || word == "volatile" => {
                    self.bump();
                }
                _ => break,
            }
        }

        let base = if !builtin_words.is_empty() {
            let base = builtin_words.join(" ");
            if TypeName::new(base.as_str()).basic_type().is_none() {
                return Ok(None);
            }
            base
        } else {
            let Some(name) = self.parse_user_type_name()? else {
                return Ok(None);
            };
            if !(self.is_type)(&name) {
                return Ok(None);
            }
            name
        };

        self.skip_cv();
        let mut declarators = Vec::new();
        loop {
            if self.eat_punct("*") {
                declarators.push(Declarator::Pointer);
                self.skip_cv();
            } else if self.eat_punct("&") {
                declarators.push(Declarator::Reference);
            } else {
                break;
            }
        }

        Ok(Some(TypeName { base, declarators }))
    }

    /// `ns::Name<Args...>`, without checking that it names a type
    fn parse_user_type_name(&mut self) -> Result<Option<String>> {
        let leading = self.eat_punct("::");
        let TokenKind::Word(first) = self.peek().kind.clone() else {
            return Ok(None);
        };
        if matches!(first.as_str(), "sizeof" | "this" | "true" | "false" | "nullptr") {
            return Ok(None);
        }
        self.bump();
        let mut name = if leading { format!("::{first}") } else { first };

        loop {
            if self.peek().is_punct("::") && matches!(self.peek_at(1).kind, TokenKind::Word(_)) {
                self.bump();
                let (segment, _) = self.expect_word()?;
                name.push_str("::");
                name.push_str(&segment);
            } else if self.peek().is_punct("<") {
                // Only a template argument list if every argument is a type.
                let saved = self.checkpoint();
                self.bump();
                let mut args = Vec::new();
                let mut complete = false;
                loop {
                    let Some(arg) = self.try_parse_type_name()? else {
                        break;
                    };
                    args.push(arg.to_string());
                    if self.eat_punct(",") {
                        continue;
                    }
                    if self.peek().is_punct(">") || self.peek().is_punct(">>") {
                        self.expect_closing_angle()?;
                        complete = true;
                    }
                    break;
                }
                if !complete {
                    self.restore(saved);
                    return Ok(Some(name));
                }
                name = format!("{}<{}>", name, args.join(", "));
            } else {
                return Ok(Some(name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{eval::ast::IntegerSuffix, ErrorKind};

    fn is_type(name: &str) -> bool {
        matches!(name, "Point" | "ns::Widget" | "std::unique_ptr" | "std::unique_ptr<int>")
    }

    fn parse(source: &str) -> Expr {
        parse_expression(source, &is_type).unwrap()
    }

    fn ident(name: &str) -> ExprKind {
        ExprKind::Identifier(name.to_string())
    }

    fn int(value: u128) -> ExprKind {
        ExprKind::IntegerLiteral { value, suffix: IntegerSuffix::default(), decimal: true }
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * 2");
        let ExprKind::Binary { op: BinaryOp::Add, lhs, rhs } = expr.kind else {
            panic!("expected an addition, got {expr:?}");
        };
        assert_eq!(lhs.kind, ident("a"));
        let ExprKind::Binary { op: BinaryOp::Mul, lhs, rhs } = rhs.kind else {
            panic!("expected a multiplication");
        };
        assert_eq!(lhs.kind, ident("b"));
        assert_eq!(rhs.kind, int(2));
    }

    #[test]
    fn test_left_associativity() {
        let expr = parse("a - b - c");
        let ExprKind::Binary { op: BinaryOp::Sub, lhs, rhs } = expr.kind else {
            panic!("expected a subtraction");
        };
        assert_eq!(rhs.kind, ident("c"));
        assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let expr = parse("a = b += 1");
        let ExprKind::Assign { op: None, rhs, .. } = expr.kind else {
            panic!("expected an assignment");
        };
        assert!(matches!(rhs.kind, ExprKind::Assign { op: Some(BinaryOp::Add), .. }));
    }

    #[test]
    fn test_conditional() {
        let expr = parse("a ? b : c ? d : e");
        let ExprKind::Conditional { otherwise, .. } = expr.kind else {
            panic!("expected a conditional");
        };
        assert!(matches!(otherwise.kind, ExprKind::Conditional { .. }));
    }

    #[test]
    fn test_cast_disambiguation() {
        let cast = parse("(Point *) p");
        let ExprKind::Cast { kind: CastKind::CStyle, ty, .. } = cast.kind else {
            panic!("expected a cast");
        };
        assert_eq!(ty.to_string(), "Point *");

        let product = parse("(x) * p");
        assert!(matches!(product.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));

        let builtin = parse("(unsigned long long)x");
        let ExprKind::Cast { ty, .. } = builtin.kind else {
            panic!("expected a cast");
        };
        assert_eq!(ty.base, "unsigned long long");

        let functional = parse("int(1.5)");
        assert!(matches!(functional.kind, ExprKind::Cast { kind: CastKind::CStyle, .. }));
    }

    #[test]
    fn test_named_casts_and_templates() {
        let expr = parse("static_cast<std::unique_ptr<int>*>(p)");
        let ExprKind::Cast { kind: CastKind::Static, ty, .. } = expr.kind else {
            panic!("expected a static_cast");
        };
        assert_eq!(ty.base, "std::unique_ptr<int>");
        assert_eq!(ty.declarators, vec![Declarator::Pointer]);

        let nested = parse_expression("reinterpret_cast<Outer<Point>>(p)", &|name| {
            matches!(name, "Point" | "Outer<Point>")
        })
        .unwrap();
        assert!(matches!(nested.kind, ExprKind::Cast { kind: CastKind::Reinterpret, .. }));
    }

    #[test]
    fn test_sizeof() {
        assert!(matches!(parse("sizeof(int)").kind, ExprKind::SizeOfType(_)));
        assert!(matches!(parse("sizeof(Point)").kind, ExprKind::SizeOfType(_)));
        assert!(matches!(parse("sizeof(x)").kind, ExprKind::SizeOfExpr(_)));
        assert!(matches!(parse("sizeof x + 1").kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_postfix_chain() {
        let expr = parse("a->b.c[1]++");
        let ExprKind::Unary { op: UnaryOp::PostInc, operand } = expr.kind else {
            panic!("expected a post-increment");
        };
        let ExprKind::Index { base, .. } = operand.kind else {
            panic!("expected an index");
        };
        let ExprKind::Member { base, member, arrow: false } = base.kind else {
            panic!("expected a member access");
        };
        assert_eq!(member, "c");
        assert!(matches!(base.kind, ExprKind::Member { arrow: true, .. }));
    }

    #[test]
    fn test_less_than_is_not_a_template() {
        let expr = parse("a < b");
        assert!(matches!(expr.kind, ExprKind::Binary { op: BinaryOp::Lt, .. }));
        let expr = parse("ns::value < 3");
        assert!(matches!(expr.kind, ExprKind::Binary { op: BinaryOp::Lt, .. }));
    }

    #[test]
    fn test_spans() {
        let expr = parse(" a + bb");
        assert_eq!(expr.span, Span::new(1, 7));
    }

    #[test]
    fn test_errors() {
        for source in ["", "a +", "(a", "a b", "static_cast<x>(y)", "f(,)", "new int"] {
            let err = parse_expression(source, &is_type).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ParseError, "source: {source:?}");
        }
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_expression(&nested(100), &is_type).is_ok());

        for source in [
            nested(50_000),
            format!("{}x", "-".repeat(50_000)),
            format!("{}x", "(int)".repeat(50_000)),
            format!("(a{}>)x", "<a".repeat(50_000)),
        ] {
            let err = parse_expression(&source, &is_type).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ParseError);
            assert!(err.message().contains("nested deeper"), "{}", err.message());
        }
    }
}
