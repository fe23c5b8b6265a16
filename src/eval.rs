//! Tree-walking evaluation of parsed programs.
//!
//! The [`Evaluator`] is a [`Visitor`] over the AST. It owns nothing: the
//! session state lives in an [`EvalContext`] it borrows for one program, so
//! two sessions in the same process never share variables, exit codes or
//! pipe buffers.
//!
//! Pipes are buffered. The left side of `a | b` runs to completion with its
//! output captured in memory, then the captured bytes become the input of the
//! first command on the right side that runs.

use crate::ast::{Expr, Program, Visitor};
use crate::builtin::BuiltinTable;
use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::{ProcessRequest, ProcessRunner};
use crate::io_adapters::MemReader;
use crate::lexer::{Token, TokenKind, contains_illegal_chars};
use regex::{Captures, Regex};
use std::io::Write;
use std::sync::LazyLock;

static VARIABLE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\?)\$(\w+)").expect("variable pattern is valid"));

/// Replaces every `$name` in a variable token with the value of `name`.
///
/// Only [`TokenKind::Variable`] tokens are substituted; quoted and plain
/// units are returned as written. `\$name` yields a literal `$name`, and a
/// reference to an unset variable is left in place.
pub fn substitute(token: &Token, env: &Environment) -> String {
    if token.kind != TokenKind::Variable {
        return token.value.clone();
    }
    VARIABLE_REFERENCE
        .replace_all(&token.value, |caps: &Captures| {
            let name = &caps[2];
            if !caps[1].is_empty() {
                format!("${}", name)
            } else {
                env.get_var(name).unwrap_or_else(|| caps[0].to_string())
            }
        })
        .into_owned()
}

/// Transient pipe buffers.
///
/// `captures` is a stack: each `|` being evaluated pushes a buffer that
/// receives everything its left side writes. `input` holds the bytes waiting
/// to be fed to the right side.
#[derive(Debug, Default)]
struct PipeState {
    captures: Vec<Vec<u8>>,
    input: Option<Vec<u8>>,
}

impl PipeState {
    fn is_idle(&self) -> bool {
        self.captures.is_empty() && self.input.is_none()
    }
}

/// Mutable evaluation state of one shell session.
#[derive(Debug, Default)]
pub struct EvalContext {
    pub env: Environment,
    exit_code: ExitCode,
    diagnostics: Vec<String>,
    pipe: PipeState,
}

impl EvalContext {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            exit_code: 0,
            diagnostics: Vec::new(),
            pipe: PipeState::default(),
        }
    }

    /// Exit code of the most recently completed command or statement.
    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    pub fn set_exit_code(&mut self, code: ExitCode) {
        self.exit_code = code;
    }

    /// Messages for errors recovered since the last [`Self::take_diagnostics`].
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.diagnostics.last().map(String::as_str)
    }

    /// Prefixes the diagnostics recorded at index `start` and later with
    /// `label: `.
    pub(crate) fn label_diagnostics_from(&mut self, start: usize, label: &str) {
        for message in self.diagnostics.iter_mut().skip(start) {
            *message = format!("{}: {}", label, message);
        }
    }

    /// Records a recovered error and makes its exit code current.
    pub fn report(&mut self, error: &ShellError) -> ExitCode {
        let code = error.exit_code();
        match error {
            ShellError::Spawn(e) => tracing::warn!(code, "{}", e),
            _ => tracing::debug!(code, "{}", error),
        }
        self.diagnostics.push(error.to_string());
        self.exit_code = code;
        code
    }

    pub fn exit_requested(&self) -> Option<ExitCode> {
        self.env.exit_request()
    }

    /// Turns a command outcome into the statement-level result: recoverable
    /// errors become an exit code, anything else keeps unwinding.
    fn settle(&mut self, outcome: Result<ExitCode, ShellError>) -> Result<ExitCode, ShellError> {
        match outcome {
            Ok(code) => {
                self.exit_code = code;
                Ok(code)
            }
            Err(e) if e.is_recoverable() => Ok(self.report(&e)),
            Err(e) => Err(e),
        }
    }
}

/// Evaluates programs against an [`EvalContext`].
pub struct Evaluator<'a> {
    ctx: &'a mut EvalContext,
    builtins: &'a BuiltinTable,
    runner: &'a dyn ProcessRunner,
    stdout: &'a mut dyn Write,
    inherit_stdout: bool,
}

impl<'a> Evaluator<'a> {
    /// `stdout` receives everything not captured by a pipe. When
    /// `inherit_stdout` is set, external programs outside a pipe write to the
    /// process's own stdout instead of being captured and copied.
    pub fn new(
        ctx: &'a mut EvalContext,
        builtins: &'a BuiltinTable,
        runner: &'a dyn ProcessRunner,
        stdout: &'a mut dyn Write,
        inherit_stdout: bool,
    ) -> Self {
        Self {
            ctx,
            builtins,
            runner,
            stdout,
            inherit_stdout,
        }
    }

    /// Runs every statement of `program` and returns the last exit code.
    ///
    /// Only [`ShellError::Internal`] escapes; every other failure is folded
    /// into the context's exit code and diagnostics.
    pub fn evaluate(&mut self, program: &Program) -> Result<ExitCode, ShellError> {
        let result = program.accept(self);
        if !self.ctx.pipe.is_idle() {
            tracing::warn!("pipe state left behind after evaluation, discarding");
            self.ctx.pipe = PipeState::default();
        }
        result
    }

    fn run_command(&mut self, name: &str, args: &[String]) -> Result<ExitCode, ShellError> {
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        if let Some(cmd) = self.builtins.create(name, &arg_refs) {
            tracing::debug!(command = name, ?args, "running builtin");
            let mut stdin = MemReader::new(self.ctx.pipe.input.take().unwrap_or_default());
            return match self.ctx.pipe.captures.last_mut() {
                Some(buf) => cmd.execute(&mut stdin, buf, &mut self.ctx.env),
                None => cmd.execute(&mut stdin, &mut *self.stdout, &mut self.ctx.env),
            };
        }

        let capture_stdout = !self.ctx.pipe.captures.is_empty() || !self.inherit_stdout;
        let output = self.runner.run(ProcessRequest {
            program: name,
            args,
            current_dir: &self.ctx.env.current_dir,
            vars: &self.ctx.env.vars,
            capture_stdout,
            stdin: self.ctx.pipe.input.take(),
        })?;

        if let Some(bytes) = output.stdout {
            match self.ctx.pipe.captures.last_mut() {
                Some(buf) => buf.extend_from_slice(&bytes),
                None => self
                    .stdout
                    .write_all(&bytes)
                    .map_err(|e| ShellError::runtime(format!("{}: writing output: {}", name, e)))?,
            }
        }
        Ok(output.code)
    }

    fn evaluate_pipe(&mut self, left: &Expr, right: &Expr) -> Result<ExitCode, ShellError> {
        self.ctx.pipe.captures.push(Vec::new());
        let left_result = left.accept(self);
        let captured = self.ctx.pipe.captures.pop().unwrap_or_default();
        if let Err(e) = left_result {
            self.ctx.pipe.input = None;
            return Err(e);
        }
        if let Some(code) = self.ctx.exit_requested() {
            self.ctx.pipe.input = None;
            return Ok(code);
        }

        tracing::debug!(bytes = captured.len(), "pipe: feeding captured output");
        self.ctx.pipe.input = Some(captured);
        let right_result = right.accept(self);
        self.ctx.pipe.input = None;
        right_result
    }
}

impl Visitor for Evaluator<'_> {
    type Output = Result<ExitCode, ShellError>;

    fn visit_program(&mut self, program: &Program) -> Self::Output {
        let mut code = 0;
        for statement in &program.statements {
            code = statement.accept(self)?;
            self.ctx.exit_code = code;
            if self.ctx.exit_requested().is_some() {
                break;
            }
        }
        self.ctx.exit_code = code;
        Ok(code)
    }

    fn visit_assignment(&mut self, variable: &Token, value: &Token) -> Self::Output {
        let name = &variable.value;
        let outcome = if name.is_empty() || contains_illegal_chars(name) {
            Err(ShellError::runtime(format!(
                "illegal characters in variable name \"{}\" at {}:{}",
                name, variable.line, variable.column
            )))
        } else {
            let value = substitute(value, &self.ctx.env);
            tracing::debug!(variable = %name, value = %value, "assignment");
            self.ctx.env.set_var(name.clone(), value);
            Ok(0)
        };
        self.ctx.settle(outcome)
    }

    fn visit_expression_statement(&mut self, expr: &Expr) -> Self::Output {
        expr.accept(self)
    }

    fn visit_binary(&mut self, op: &Token, left: &Expr, right: &Expr) -> Self::Output {
        match op.kind {
            TokenKind::And => {
                let code = left.accept(self)?;
                if code != 0 || self.ctx.exit_requested().is_some() {
                    return Ok(code);
                }
                right.accept(self)
            }
            TokenKind::Or => {
                let code = left.accept(self)?;
                if code == 0 || self.ctx.exit_requested().is_some() {
                    return Ok(code);
                }
                right.accept(self)
            }
            TokenKind::Pipe => self.evaluate_pipe(left, right),
            other => Err(ShellError::Internal(format!(
                "unexpected binary operator {} at {}:{}",
                other, op.line, op.column
            ))),
        }
    }

    fn visit_command(&mut self, executable: &Token, arguments: &[Token]) -> Self::Output {
        let name = substitute(executable, &self.ctx.env);
        let args: Vec<String> = arguments
            .iter()
            .map(|arg| substitute(arg, &self.ctx.env))
            .collect();
        let outcome = self.run_command(&name, &args);
        self.ctx.settle(outcome)
    }
}
