//! Pratt parser for the Monkey language.
//!
//! The parser converts a stream of tokens into a [`Program`]. Errors do not
//! stop parsing: each failed top-level statement is recorded, the parser
//! skips ahead to the next `;`, and all errors are reported together.
//!
//! Expression trees are at most [`MAX_NESTING`] levels tall. Everything
//! downstream (the compiler, the evaluator, `Display`, and `Drop`) recurses
//! over the tree, so deeper input is rejected here as `LimitExceeded`.

use std::mem;

use monkey_foundation::{Error, ErrorKind, Result};

use crate::ast::{Block, Expression, Ident, Program, Statement};
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Maximum height of a parsed expression tree.
pub const MAX_NESTING: usize = 128;

/// Binding power of infix operators, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Anything binds tighter than this.
    Lowest,
    /// `==` and `!=`
    Equals,
    /// `<` and `>`
    LessGreater,
    /// `+` and `-`
    Sum,
    /// `*` and `/`
    Product,
    /// `-x` and `!x`
    Prefix,
    /// `f(x)`
    Call,
    /// `a[i]`
    Index,
}

impl Precedence {
    /// Returns the precedence of `kind` when it appears in infix position.
    #[must_use]
    pub fn of(kind: &TokenKind) -> Self {
        match kind {
            TokenKind::Eq | TokenKind::NotEq => Self::Equals,
            TokenKind::Lt | TokenKind::Gt => Self::LessGreater,
            TokenKind::Plus | TokenKind::Minus => Self::Sum,
            TokenKind::Asterisk | TokenKind::Slash => Self::Product,
            TokenKind::LParen => Self::Call,
            TokenKind::LBracket => Self::Index,
            _ => Self::Lowest,
        }
    }
}

/// Parser for Monkey source code.
pub struct Parser<'src> {
    /// The lexer providing tokens.
    lexer: Lexer<'src>,
    /// Current token (lookahead).
    current: Token,
    /// Open `parse_expression` calls.
    depth: usize,
    /// Tallest expression returned since the enclosing expression began.
    tallest: usize,
}

impl<'src> Parser<'src> {
    /// Creates a new parser for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            depth: 0,
            tallest: 0,
        }
    }

    /// Parses the whole source as a program.
    ///
    /// # Errors
    /// Returns every parse error found, bundled with [`Error::collected`].
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program::default();
        let mut errors = Vec::new();

        while self.current.kind != TokenKind::Eof {
            match self.parse_statement() {
                Ok(statement) => program.statements.push(statement),
                Err(error) => {
                    errors.push(error);
                    self.synchronize();
                }
            }
        }

        if errors.is_empty() {
            Ok(program)
        } else {
            Err(Error::collected(errors))
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let statement = match self.current.kind {
            TokenKind::Let => self.parse_let()?,
            TokenKind::Return => {
                let span = self.current.span;
                self.advance();
                let value = self.parse_expression(Precedence::Lowest)?;
                Statement::Return { value, span }
            }
            _ => Statement::Expression(self.parse_expression(Precedence::Lowest)?),
        };
        self.eat(&TokenKind::Semicolon);
        Ok(statement)
    }

    fn parse_let(&mut self) -> Result<Statement> {
        let span = self.current.span;
        self.advance();

        let name = self.parse_ident()?;
        self.expect(&TokenKind::Assign)?;
        let mut value = self.parse_expression(Precedence::Lowest)?;

        // A function bound by `let` knows its own name so it can recurse.
        if let Expression::Function { name: fn_name, .. } = &mut value {
            if fn_name.is_none() {
                *fn_name = Some(name.name.clone());
            }
        }

        Ok(Statement::Let { name, value, span })
    }

    /// Parses an expression whose operators all bind tighter than `precedence`.
    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression> {
        if self.depth >= MAX_NESTING {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = self.parse_operator_chain(precedence);
        self.depth -= 1;
        result
    }

    fn parse_operator_chain(&mut self, precedence: Precedence) -> Result<Expression> {
        let siblings = mem::take(&mut self.tallest);

        let mut left = self.parse_prefix()?;
        let mut height = self.tallest + 1;

        while self.current.kind != TokenKind::Semicolon
            && precedence < Precedence::of(&self.current.kind)
        {
            if height >= MAX_NESTING {
                return Err(self.too_deep());
            }
            self.tallest = 0;
            left = match self.current.kind {
                TokenKind::LParen => self.parse_call(left)?,
                TokenKind::LBracket => self.parse_index(left)?,
                _ => self.parse_infix(left)?,
            };
            height = height.max(self.tallest) + 1;
        }

        if height > MAX_NESTING {
            return Err(self.too_deep());
        }
        self.tallest = siblings.max(height);
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expression> {
        let span = self.current.span;
        match &self.current.kind {
            TokenKind::Ident(_) => Ok(Expression::Ident(self.parse_ident()?)),
            TokenKind::Int(text) => {
                let text = text.clone();
                self.advance();
                match text.parse::<i64>() {
                    Ok(n) => Ok(Expression::Int(n, span)),
                    Err(_) => Err(Error::new(ErrorKind::MalformedLiteral(text))
                        .at(span.line, span.column)),
                }
            }
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expression::String(s, span))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.current.kind == TokenKind::True;
                self.advance();
                Ok(Expression::Bool(value, span))
            }
            TokenKind::Bang | TokenKind::Minus => {
                let operator = self.operator_text();
                self.advance();
                let right = self.parse_expression(Precedence::Prefix)?;
                Ok(Expression::Prefix {
                    operator,
                    right: Box::new(right),
                    span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Function => self.parse_function(),
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_expression_list(&TokenKind::RBracket)?;
                Ok(Expression::Array(elements, span))
            }
            TokenKind::LBrace => self.parse_hash(),
            TokenKind::Illegal(text) => Err(self.error(&format!("illegal token {text}"))),
            kind => Err(self.error(&format!("no prefix parse function for {kind} found"))),
        }
    }

    fn parse_infix(&mut self, left: Expression) -> Result<Expression> {
        let span = self.current.span;
        let precedence = Precedence::of(&self.current.kind);
        let operator = self.operator_text();
        self.advance();
        let right = self.parse_expression(precedence)?;
        Ok(Expression::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            span,
        })
    }

    fn parse_call(&mut self, function: Expression) -> Result<Expression> {
        let span = self.current.span;
        self.advance();
        let arguments = self.parse_expression_list(&TokenKind::RParen)?;
        Ok(Expression::Call {
            function: Box::new(function),
            arguments,
            span,
        })
    }

    fn parse_index(&mut self, left: Expression) -> Result<Expression> {
        let span = self.current.span;
        self.advance();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect(&TokenKind::RBracket)?;
        Ok(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
            span,
        })
    }

    fn parse_if(&mut self) -> Result<Expression> {
        let span = self.current.span;
        self.advance();

        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect(&TokenKind::RParen)?;
        let consequence = self.parse_block()?;

        let alternative = if self.eat(&TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
            span,
        })
    }

    fn parse_function(&mut self) -> Result<Expression> {
        let span = self.current.span;
        self.advance();

        self.expect(&TokenKind::LParen)?;
        let mut parameters = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                parameters.push(self.parse_ident()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen)?;
        }

        let body = self.parse_block()?;
        Ok(Expression::Function {
            name: None,
            parameters,
            body,
            span,
        })
    }

    fn parse_hash(&mut self) -> Result<Expression> {
        let span = self.current.span;
        self.advance();

        let mut pairs = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if self.current.kind != TokenKind::RBrace {
                self.expect(&TokenKind::Comma)?;
            }
        }

        Ok(Expression::Hash(pairs, span))
    }

    fn parse_block(&mut self) -> Result<Block> {
        let span = self.current.span;
        self.expect(&TokenKind::LBrace)?;

        let mut statements = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.current.kind == TokenKind::Eof {
                return Err(self.unexpected(&TokenKind::RBrace));
            }
            statements.push(self.parse_statement()?);
        }

        Ok(Block { statements, span })
    }

    /// Parses comma-separated expressions up to and including `end`.
    fn parse_expression_list(&mut self, end: &TokenKind) -> Result<Vec<Expression>> {
        let mut list = Vec::new();
        if self.eat(end) {
            return Ok(list);
        }

        loop {
            list.push(self.parse_expression(Precedence::Lowest)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(end)?;

        Ok(list)
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        if let TokenKind::Ident(name) = &self.current.kind {
            let ident = Ident {
                name: name.clone(),
                span: self.current.span,
            };
            self.advance();
            Ok(ident)
        } else {
            Err(self.unexpected(&TokenKind::Ident(String::new())))
        }
    }

    fn operator_text(&self) -> String {
        self.current.kind.operator().unwrap_or_default().to_string()
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    /// Consumes the current token if it is `kind`.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.current.kind == *kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects the current token to be of a specific kind, then advances.
    fn expect(&mut self, expected: &TokenKind) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Skips past the rest of a failed statement.
    fn synchronize(&mut self) {
        while !matches!(self.current.kind, TokenKind::Semicolon | TokenKind::Eof) {
            self.advance();
        }
        self.eat(&TokenKind::Semicolon);
    }

    fn unexpected(&self, expected: &TokenKind) -> Error {
        self.error(&format!(
            "expected next token to be {expected}, got {} instead",
            self.current.kind
        ))
    }

    fn too_deep(&self) -> Error {
        let span = self.current.span;
        Error::limit_exceeded("nested expressions", MAX_NESTING).at(span.line, span.column)
    }

    /// Creates a parse error at the current position.
    fn error(&self, message: &str) -> Error {
        error_at(self.current.span, message)
    }
}

fn error_at(span: Span, message: &str) -> Error {
    Error::new(ErrorKind::Parse {
        message: message.to_string(),
        line: span.line,
        column: span.column,
    })
}

/// Parses source code into a program.
///
/// # Errors
/// Returns the collected parse errors if the source cannot be parsed.
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source).parse_program()
}
