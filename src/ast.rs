//! Abstract syntax tree for one parsed line.
//!
//! Nodes are plain data. Consumers implement [`Visitor`] and call `accept` on a
//! node, which matches on the node's variant and invokes the matching handler.

use crate::lexer::Token;

/// A whole parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A single statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `name = value`
    Assignment { variable: Token, value: Token },
    /// An expression evaluated for its exit code.
    Expression(Expr),
}

/// An expression producing an exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `left op right`, where `op` is an `And`, `Or` or `Pipe` token.
    Binary {
        op: Token,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// An executable followed by its arguments.
    Command {
        executable: Token,
        arguments: Vec<Token>,
    },
}

/// Double dispatch over the node set, parameterized by the result type.
pub trait Visitor {
    type Output;

    fn visit_program(&mut self, program: &Program) -> Self::Output;
    fn visit_assignment(&mut self, variable: &Token, value: &Token) -> Self::Output;
    fn visit_expression_statement(&mut self, expr: &Expr) -> Self::Output;
    fn visit_binary(&mut self, op: &Token, left: &Expr, right: &Expr) -> Self::Output;
    fn visit_command(&mut self, executable: &Token, arguments: &[Token]) -> Self::Output;
}

impl Program {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        visitor.visit_program(self)
    }
}

impl Statement {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Statement::Assignment { variable, value } => visitor.visit_assignment(variable, value),
            Statement::Expression(expr) => visitor.visit_expression_statement(expr),
        }
    }
}

impl Expr {
    pub fn accept<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Expr::Binary { op, left, right } => visitor.visit_binary(op, left, right),
            Expr::Command {
                executable,
                arguments,
            } => visitor.visit_command(executable, arguments),
        }
    }
}

/// Renders a tree as an S-expression, e.g. `(|| (cmd a) (cmd b))`.
///
/// Unit values are shown quoted so that empty units and embedded spaces stay
/// visible.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(program: &Program) -> String {
        program.accept(&mut AstPrinter)
    }

    fn token(token: &Token) -> String {
        match token.kind {
            crate::lexer::TokenKind::Variable => token.value.clone(),
            _ => format!("{:?}", token.value),
        }
    }
}

impl Visitor for AstPrinter {
    type Output = String;

    fn visit_program(&mut self, program: &Program) -> String {
        program
            .statements
            .iter()
            .map(|s| s.accept(self))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn visit_assignment(&mut self, variable: &Token, value: &Token) -> String {
        format!("(= {} {})", Self::token(variable), Self::token(value))
    }

    fn visit_expression_statement(&mut self, expr: &Expr) -> String {
        expr.accept(self)
    }

    fn visit_binary(&mut self, op: &Token, left: &Expr, right: &Expr) -> String {
        format!("({} {} {})", op.value, left.accept(self), right.accept(self))
    }

    fn visit_command(&mut self, executable: &Token, arguments: &[Token]) -> String {
        let mut out = format!("(cmd {}", Self::token(executable));
        for arg in arguments {
            out.push(' ');
            out.push_str(&Self::token(arg));
        }
        out.push(')');
        out
    }
}
