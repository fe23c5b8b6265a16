//! Recursive-descent parser turning a token sequence into a [`Program`].
//!
//! Binding, from loosest to tightest: `||`, `&&`, `|`, then parenthesized
//! expressions and commands. All binary operators are left-associative.

use crate::ast::{Expr, Program, Statement};
use crate::lexer::{Lexer, LexError, Token, TokenKind};
use thiserror::Error;

/// Errors that can occur during the AST construction (parsing) phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A specific token kind was required but something else was found.
    #[error("expected {expected}, but got {found} {value:?} instead at {line}:{column}")]
    Expected {
        expected: String,
        found: TokenKind,
        value: String,
        line: usize,
        column: usize,
    },
    /// Encountered a token that was not expected at the current position according to the grammar.
    #[error("unexpected {found} {value:?} at {line}:{column}")]
    Unexpected {
        found: TokenKind,
        value: String,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    fn unexpected(token: &Token) -> Self {
        ParseError::Unexpected {
            found: token.kind,
            value: token.value.clone(),
            line: token.line,
            column: token.column,
        }
    }

    fn expected(kinds: &[TokenKind], token: &Token) -> Self {
        ParseError::Expected {
            expected: kinds
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" or "),
            found: token.kind,
            value: token.value.clone(),
            line: token.line,
            column: token.column,
        }
    }
}

/// Either half of the front end failing on a line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

struct AstBuilder {
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
}

impl AstBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        let eof = match tokens.last() {
            Some(last) if last.kind == TokenKind::Eof => last.clone(),
            Some(last) => Token::new(TokenKind::Eof, "", last.line, last.column + last.value.chars().count()),
            None => Token::new(TokenKind::Eof, "", 1, 1),
        };
        AstBuilder {
            tokens,
            pos: 0,
            eof,
        }
    }

    /// program := (statement (';' statement)* ';'?)? Eof
    fn build_ast(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();

        while self.peek().kind != TokenKind::Eof {
            statements.push(self.parse_statement()?);

            match self.peek().kind {
                TokenKind::Semicolon => {
                    self.consume();
                }
                TokenKind::Eof => {}
                _ => return Err(ParseError::unexpected(self.peek())),
            }
        }

        Ok(Program { statements })
    }

    fn peek(&self) -> &Token {
        self.peek_n(0)
    }

    /// Helper to look ahead n tokens
    fn peek_n(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&self.eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kinds: &[TokenKind]) -> Result<Token, ParseError> {
        if kinds.contains(&self.peek().kind) {
            Ok(self.consume())
        } else {
            Err(ParseError::expected(kinds, self.peek()))
        }
    }

    /// statement := assignment | expression
    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.peek_n(1).kind == TokenKind::Equals {
            return self.parse_assignment();
        }
        Ok(Statement::Expression(self.parse_expression()?))
    }

    /// assignment := Unit '=' (Unit | Variable)
    fn parse_assignment(&mut self) -> Result<Statement, ParseError> {
        let variable = self.expect(&[TokenKind::Unit])?;
        self.expect(&[TokenKind::Equals])?;
        let value = self.expect(&[TokenKind::Unit, TokenKind::Variable])?;
        Ok(Statement::Assignment { variable, value })
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(TokenKind::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(TokenKind::And, Self::parse_pipe)
    }

    fn parse_pipe(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(TokenKind::Pipe, Self::parse_primary)
    }

    /// Parses `operand (op operand)*` into a left-leaning chain.
    fn parse_binary(
        &mut self,
        op_kind: TokenKind,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut lhs = operand(self)?;
        while self.peek().kind == op_kind {
            let op = self.consume();
            let rhs = operand(self)?;
            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    /// primary := '(' expression ')' | command
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind {
            TokenKind::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&[TokenKind::RightParen])?;
                Ok(expr)
            }
            TokenKind::Unit | TokenKind::Variable => self.parse_command(),
            _ => Err(ParseError::unexpected(self.peek())),
        }
    }

    /// command := (Unit | Variable) (Unit | Variable)*
    fn parse_command(&mut self) -> Result<Expr, ParseError> {
        let executable = self.expect(&[TokenKind::Unit, TokenKind::Variable])?;
        let mut arguments = Vec::new();
        while matches!(self.peek().kind, TokenKind::Unit | TokenKind::Variable) {
            arguments.push(self.consume());
        }
        Ok(Expr::Command {
            executable,
            arguments,
        })
    }
}

/// Constructs a [`Program`] from a vector of tokens.
///
/// The tokens are normally the output of [`crate::lexer::tokenize`] and end
/// with `Eof`; a missing `Eof` is tolerated.
pub fn construct_ast(tokens: Vec<Token>) -> Result<Program, ParseError> {
    AstBuilder::from(tokens).build_ast()
}

/// Tokenizes and parses `source` in one go.
pub fn parse_line(source: &str) -> Result<Program, SyntaxError> {
    parse_lexer(Lexer::new(source))
}

/// Drains `lexer` and parses the resulting tokens.
pub fn parse_lexer(lexer: Lexer) -> Result<Program, SyntaxError> {
    let tokens = lexer.collect::<Result<Vec<_>, _>>()?;
    Ok(construct_ast(tokens)?)
}
