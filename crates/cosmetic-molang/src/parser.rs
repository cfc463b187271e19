//! Recursive-descent parser turning tokens into a [`Program`]
//!
//! Precedence, loosest first: assignment, `?:`, `??`, `||`, `&&`,
//! comparisons, `+ -`, `* /`, unary `- !`.

use crate::ast::{BinaryOp, Namespace, Node, Program, UnaryOp};
use crate::error::{MolangError, Result};
use crate::functions::MathFunction;
use crate::lexer::{Spanned, Token, tokenize};

/// Parse Molang source into a program
pub fn parse(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.program()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        let mut complex = false;

        while !self.at_end() {
            let statement = self.expression()?;
            if matches!(statement, Node::Return(_)) {
                complex = true;
            }
            statements.push(statement);

            if self.eat(&Token::Semicolon) {
                complex = true;
                // Tolerate stray semicolons: `a;;b`
                while self.eat(&Token::Semicolon) {}
            } else if !self.at_end() {
                return Err(self.unexpected("';' or end of expression"));
            }
        }

        if complex {
            return Ok(Program::Complex(statements));
        }
        Ok(Program::Simple(
            statements.pop().unwrap_or(Node::Constant(0.0)),
        ))
    }

    fn expression(&mut self) -> Result<Node> {
        let offset = self.offset();
        let target = self.conditional()?;

        if !self.eat(&Token::Assign) {
            return Ok(target);
        }
        match target {
            Node::Name(namespace @ (Namespace::Variable | Namespace::Temp), name) => {
                let value = self.expression()?;
                Ok(Node::Assign(namespace, name, Box::new(value)))
            }
            _ => Err(MolangError::InvalidAssignment { offset }),
        }
    }

    fn conditional(&mut self) -> Result<Node> {
        let condition = self.coalesce()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }

        let then = self.conditional()?;
        let otherwise = if self.eat(&Token::Colon) {
            Some(Box::new(self.conditional()?))
        } else {
            None
        };
        Ok(Node::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise,
        })
    }

    fn coalesce(&mut self) -> Result<Node> {
        let mut lhs = self.logical_or()?;
        while self.eat(&Token::QuestionQuestion) {
            let rhs = self.logical_or()?;
            lhs = Node::Coalesce(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn logical_or(&mut self) -> Result<Node> {
        let mut lhs = self.logical_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.logical_and()?;
            lhs = Node::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Node> {
        let mut lhs = self.comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.comparison()?;
            lhs = Node::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Node> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Result<Node> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Node> {
        if self.eat(&Token::Minus) {
            let inner = self.unary()?;
            return Ok(match inner {
                Node::Constant(value) => Node::Constant(-value),
                other => Node::Unary(UnaryOp::Negate, Box::new(other)),
            });
        }
        if self.eat(&Token::Bang) {
            return Ok(Node::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node> {
        let Some(spanned) = self.tokens.get(self.pos).cloned() else {
            return Err(MolangError::UnexpectedEnd {
                expected: "a value".to_string(),
            });
        };
        self.pos += 1;

        match spanned.token {
            Token::Number(value) => Ok(Node::Constant(value)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBrace => self.block(),
            Token::Ident(word) => self.named(&word),
            other => Err(MolangError::UnexpectedToken {
                offset: spanned.offset,
                expected: "a value".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Statements up to the closing brace; the opening brace is consumed
    fn block(&mut self) -> Result<Node> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&Token::Semicolon) {}
            if self.eat(&Token::RBrace) {
                return Ok(Node::Block(statements));
            }
            statements.push(self.expression()?);
            if !self.eat(&Token::Semicolon) && self.peek() != Some(&Token::RBrace) {
                return Err(self.unexpected("';' or '}'"));
            }
        }
    }

    fn named(&mut self, word: &str) -> Result<Node> {
        match word {
            "true" => return Ok(Node::Constant(1.0)),
            "false" => return Ok(Node::Constant(0.0)),
            "loop" => return self.loop_statement(),
            "break" => return Ok(Node::Break),
            "continue" => return Ok(Node::Continue),
            "return" => return Ok(Node::Return(Box::new(self.expression()?))),
            _ => {}
        }

        self.expect(&Token::Dot)?;
        let name = self.ident()?;

        match word {
            "math" => {
                let function = MathFunction::from_name(&name)?;
                let args = self.arguments()?;
                if args.len() != function.arity() {
                    return Err(MolangError::WrongArgumentCount {
                        name,
                        expected: function.arity(),
                        actual: args.len(),
                    });
                }
                Ok(Node::Math(function, args))
            }
            "query" | "q" => {
                let args = self.arguments()?;
                Ok(Node::Query(name, args))
            }
            prefix => Namespace::from_prefix(prefix)
                .map(|namespace| Node::Name(namespace, name))
                .ok_or_else(|| MolangError::UnknownNamespace(prefix.to_string())),
        }
    }

    fn loop_statement(&mut self) -> Result<Node> {
        self.expect(&Token::LParen)?;
        let count = self.expression()?;
        self.expect(&Token::Comma)?;
        let body = self.expression()?;
        self.expect(&Token::RParen)?;
        Ok(Node::Loop(Box::new(count), Box::new(body)))
    }

    /// Optional parenthesised argument list
    fn arguments(&mut self) -> Result<Vec<Node>> {
        let mut args = Vec::new();
        if !self.eat(&Token::LParen) {
            return Ok(args);
        }
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.tokens.get(self.pos) {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(0, |s| s.offset)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> MolangError {
        match self.tokens.get(self.pos) {
            Some(spanned) => MolangError::UnexpectedToken {
                offset: spanned.offset,
                expected: expected.to_string(),
                found: spanned.token.to_string(),
            },
            None => MolangError::UnexpectedEnd {
                expected: expected.to_string(),
            },
        }
    }
}
