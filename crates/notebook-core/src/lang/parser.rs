//! Recursive-descent parser for the notebook's imperative language.
//!
//! Grammar is exactly the one named in SPEC_FULL.md §4.B.1: literals,
//! collections, the usual expression precedence ladder, simple/destructuring/
//! augmented assignment, `if/elif/else`, `while`, `for .. in`, `def`, `class`,
//! `import`/`from .. import`, `return`, and list comprehensions.

use super::ast::*;
use super::lexer::{tokenize, LexError, Token};
use std::fmt;

#[derive(Debug)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError(e.0)
    }
}

pub fn parse(src: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens, pos: 0 };
    p.parse_module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, t: &Token) -> bool {
        self.peek() == t
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Name(n) if n == kw)
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.is_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(ParseError(format!("expected '{kw}', found {:?}", self.peek())))
        }
    }

    fn expect(&mut self, t: Token) -> Result<(), ParseError> {
        if self.check(&t) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError(format!("expected {t:?}, found {:?}", self.peek())))
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Name(n) => Ok(n),
            other => Err(ParseError(format!("expected identifier, found {other:?}"))),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&Token::Newline) {
            self.advance();
        }
    }

    fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !self.check(&Token::Eof) {
            stmts.push(self.parse_stmt()?);
            self.skip_newlines();
        }
        Ok(stmts)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(Token::Colon)?;
        self.expect(Token::Newline)?;
        self.expect(Token::Indent)?;
        let mut stmts = Vec::new();
        while !self.check(&Token::Dedent) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(Token::Dedent)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        if self.is_kw("if") {
            return self.parse_if();
        }
        if self.is_kw("while") {
            return self.parse_while();
        }
        if self.is_kw("for") {
            return self.parse_for();
        }
        if self.is_kw("def") {
            return self.parse_funcdef();
        }
        if self.is_kw("class") {
            return self.parse_classdef();
        }
        if self.is_kw("import") {
            return self.parse_import();
        }
        if self.is_kw("from") {
            return self.parse_from_import();
        }
        if self.is_kw("return") {
            self.advance();
            let value = if self.check(&Token::Newline) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(Token::Newline)?;
            return Ok(Stmt::Return(value));
        }
        self.parse_simple_stmt()
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("if")?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        let mut branches = vec![(cond, body)];
        let mut else_body = Vec::new();
        loop {
            if self.is_kw("elif") {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                branches.push((cond, body));
                continue;
            }
            if self.is_kw("else") {
                self.advance();
                else_body = self.parse_block()?;
            }
            break;
        }
        Ok(Stmt::If { branches, else_body })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("while")?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("for")?;
        let var = self.parse_target_expr()?;
        self.expect_kw("in")?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::For { var, iter, body })
    }

    fn parse_funcdef(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("def")?;
        let name = self.expect_name()?;
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                params.push(self.expect_name()?);
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::FunctionDef { name, params, body })
    }

    fn parse_classdef(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("class")?;
        let name = self.expect_name()?;
        if self.check(&Token::LParen) {
            self.advance();
            self.expect(Token::RParen)?;
        }
        let methods = self.parse_block()?;
        Ok(Stmt::ClassDef { name, methods })
    }

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("import")?;
        let module = self.parse_dotted_name()?;
        let alias = if self.eat_kw("as") {
            Some(self.expect_name()?)
        } else {
            None
        };
        self.expect(Token::Newline)?;
        Ok(Stmt::Import { module, alias })
    }

    fn parse_from_import(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("from")?;
        let module = self.parse_dotted_name()?;
        self.expect_kw("import")?;
        let mut names = Vec::new();
        loop {
            let n = self.expect_name()?;
            let alias = if self.eat_kw("as") {
                Some(self.expect_name()?)
            } else {
                None
            };
            names.push((n, alias));
            if self.check(&Token::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(Token::Newline)?;
        Ok(Stmt::FromImport { module, names })
    }

    fn parse_dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect_name()?;
        while self.check(&Token::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    /// Parses a for-loop / comprehension target: a name or a parenthesized/bracketed
    /// destructuring pattern, without consuming an assignment.
    fn parse_target_expr(&mut self) -> Result<AssignTarget, ParseError> {
        if self.check(&Token::LParen) || self.check(&Token::LBracket) {
            let expr = self.parse_atom()?;
            return expr_to_target(expr);
        }
        let mut names = vec![AssignTarget::Name(self.expect_name()?)];
        while self.check(&Token::Comma) {
            self.advance();
            names.push(AssignTarget::Name(self.expect_name()?));
        }
        if names.len() == 1 {
            Ok(names.into_iter().next().unwrap())
        } else {
            Ok(AssignTarget::Tuple(names))
        }
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt, ParseError> {
        // Fast path: `name op= expr`.
        if let Token::Name(n) = self.peek().clone() {
            let op = match &self.tokens[self.pos + 1] {
                Token::PlusEq => Some(AugOp::Add),
                Token::MinusEq => Some(AugOp::Sub),
                Token::StarEq => Some(AugOp::Mul),
                Token::SlashEq => Some(AugOp::Div),
                _ => None,
            };
            if let Some(op) = op {
                self.advance(); // name
                self.advance(); // op=
                let expr = self.parse_expr()?;
                self.expect(Token::Newline)?;
                return Ok(Stmt::AugAssign(n, op, expr));
            }
        }

        let first = self.parse_expr()?;
        let mut targets = vec![first.clone()];
        while self.check(&Token::Comma) {
            // Only consume the comma as part of a destructuring LHS if an
            // assignment eventually follows; a bare tuple expr-statement
            // would also hit this path and is still valid to parse as such.
            self.advance();
            targets.push(self.parse_expr()?);
        }

        if self.check(&Token::Eq) {
            self.advance();
            let rhs = self.parse_expr()?;
            self.expect(Token::Newline)?;
            let target = if targets.len() == 1 {
                expr_to_target(targets.into_iter().next().unwrap())?
            } else {
                AssignTarget::Tuple(
                    targets
                        .into_iter()
                        .map(expr_to_target)
                        .collect::<Result<_, _>>()?,
                )
            };
            return Ok(Stmt::Assign(target, rhs));
        }

        self.expect(Token::Newline)?;
        if targets.len() == 1 {
            Ok(Stmt::Expr(targets.into_iter().next().unwrap()))
        } else {
            Ok(Stmt::Expr(Expr::Tuple(targets)))
        }
    }

    // --- expressions, precedence climbing ---

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.is_kw("or") {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.is_kw("and") {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.is_kw("not") {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_arith()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                Token::Lt => BinOp::Lt,
                Token::LtEq => BinOp::LtEq,
                Token::Gt => BinOp::Gt,
                Token::GtEq => BinOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_arith()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Minus) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                Token::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&Token::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(&Token::Comma) {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    self.expect(Token::RParen)?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Token::Dot => {
                    self.advance();
                    let name = self.expect_name()?;
                    expr = Expr::Attribute(Box::new(expr), name);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Int(v) => {
                self.advance();
                Ok(Expr::Int(v))
            }
            Token::Float(v) => {
                self.advance();
                Ok(Expr::Float(v))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Name(n) if n == "true" => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::Name(n) if n == "false" => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Name(n) if n == "none" => {
                self.advance();
                Ok(Expr::None)
            }
            Token::Name(n) => {
                self.advance();
                Ok(Expr::Name(n))
            }
            Token::LParen => {
                self.advance();
                if self.check(&Token::RParen) {
                    self.advance();
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.check(&Token::Comma) {
                    let mut items = vec![first];
                    while self.check(&Token::Comma) {
                        self.advance();
                        if self.check(&Token::RParen) {
                            break;
                        }
                        items.push(self.parse_expr()?);
                    }
                    self.expect(Token::RParen)?;
                    Ok(Expr::Tuple(items))
                } else {
                    self.expect(Token::RParen)?;
                    Ok(first)
                }
            }
            Token::LBracket => {
                self.advance();
                if self.check(&Token::RBracket) {
                    self.advance();
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.is_kw("for") {
                    self.advance();
                    let var = self.parse_target_expr()?;
                    self.expect_kw("in")?;
                    let iter = self.parse_expr()?;
                    let cond = if self.is_kw("if") {
                        self.advance();
                        Some(Box::new(self.parse_expr()?))
                    } else {
                        None
                    };
                    self.expect(Token::RBracket)?;
                    return Ok(Expr::Comprehension {
                        expr: Box::new(first),
                        var,
                        iter: Box::new(iter),
                        cond,
                    });
                }
                let mut items = vec![first];
                while self.check(&Token::Comma) {
                    self.advance();
                    if self.check(&Token::RBracket) {
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            other => Err(ParseError(format!("unexpected token {other:?}"))),
        }
    }
}

fn expr_to_target(expr: Expr) -> Result<AssignTarget, ParseError> {
    match expr {
        Expr::Name(n) => Ok(AssignTarget::Name(n)),
        Expr::List(items) | Expr::Tuple(items) => Ok(AssignTarget::Tuple(
            items.into_iter().map(expr_to_target).collect::<Result<_, _>>()?,
        )),
        other => Err(ParseError(format!("invalid assignment target: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_assignment() {
        let module = parse("x = 1\n").unwrap();
        assert_eq!(module, vec![Stmt::Assign(AssignTarget::Name("x".into()), Expr::Int(1))]);
    }

    #[test]
    fn parses_destructuring_assignment() {
        let module = parse("x, y = 1, 2\n").unwrap();
        assert_eq!(
            module,
            vec![Stmt::Assign(
                AssignTarget::Tuple(vec![AssignTarget::Name("x".into()), AssignTarget::Name("y".into())]),
                Expr::Tuple(vec![Expr::Int(1), Expr::Int(2)]),
            )]
        );
    }

    #[test]
    fn parses_if_elif_else() {
        let module = parse("if x:\n    y = 1\nelif z:\n    y = 2\nelse:\n    y = 3\n").unwrap();
        match &module[0] {
            Stmt::If { branches, else_body } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(else_body.len(), 1);
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parses_function_def_and_call() {
        let module = parse("def f(a, b):\n    return a + b\nf(1, 2)\n").unwrap();
        assert!(matches!(&module[0], Stmt::FunctionDef { name, params, .. } if name == "f" && params.len() == 2));
        assert!(matches!(&module[1], Stmt::Expr(Expr::Call(_, args)) if args.len() == 2));
    }

    #[test]
    fn parses_list_comprehension() {
        let module = parse("xs = [i * 2 for i in ys if i > 0]\n").unwrap();
        match &module[0] {
            Stmt::Assign(_, Expr::Comprehension { cond, .. }) => assert!(cond.is_some()),
            other => panic!("expected comprehension assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_augmented_assignment() {
        let module = parse("x += 1\n").unwrap();
        assert_eq!(module, vec![Stmt::AugAssign("x".into(), AugOp::Add, Expr::Int(1))]);
    }

    #[test]
    fn parses_attribute_and_index() {
        let module = parse("y = a.b[0]\n").unwrap();
        assert!(matches!(&module[0], Stmt::Assign(_, Expr::Index(..))));
    }
}
