use crate::ast::AstPrinter;
use crate::builtin::BuiltinTable;
use crate::command::{ExitCode, Stdout};
use crate::env::Environment;
use crate::error::ShellError;
use crate::eval::{EvalContext, Evaluator};
use crate::external::{ProcessRunner, SystemRunner};
use crate::io_adapters::MemWriter;
use crate::lexer::{Lexer, split_spans};
use crate::parser::parse_lexer;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::path::Path;

/// Prompt shown when the `prompt` variable is unset.
pub const DEFAULT_PROMPT: &str = "$ ";

/// One shell session.
///
/// The interpreter owns the session's [`EvalContext`] (variables, current
/// directory, last exit code, diagnostics), the [`BuiltinTable`] consulted
/// before external programs, the [`ProcessRunner`] that starts those
/// programs, and the sink that receives command output.
///
/// Example
/// ```
/// use appshell::{Interpreter, MemWriter};
/// let out = MemWriter::new();
/// let mut sh = Interpreter::with_output(out.clone());
/// let code = sh.execute("greeting = hello; echo $greeting world");
/// assert_eq!(code, 0);
/// assert_eq!(out.contents(), "hello world\n");
/// ```
pub struct Interpreter {
    ctx: EvalContext,
    builtins: BuiltinTable,
    runner: Box<dyn ProcessRunner>,
    stdout: Box<dyn Stdout>,
    report_errors: bool,
}

impl Interpreter {
    /// Create a session rooted at the process's current directory.
    pub fn new(
        builtins: BuiltinTable,
        runner: Box<dyn ProcessRunner>,
        stdout: Box<dyn Stdout>,
    ) -> Self {
        Self {
            ctx: EvalContext::new(Environment::new()),
            builtins,
            runner,
            stdout,
            report_errors: false,
        }
    }

    /// A session with the default built-ins and real processes whose output
    /// is collected in `output`.
    pub fn with_output(output: MemWriter) -> Self {
        Self::new(
            BuiltinTable::default(),
            Box::new(SystemRunner),
            Box::new(output),
        )
    }

    /// Replace the session's environment.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.ctx.env = env;
        self
    }

    /// Print each error to stderr as `[Error]: message` right after the line
    /// that caused it, instead of only keeping it in the diagnostics.
    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.ctx.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.ctx.env
    }

    /// Exit code of the most recently completed statement.
    pub fn exit_code(&self) -> ExitCode {
        self.ctx.exit_code()
    }

    /// Code passed to `exit`, once the session has been asked to end.
    pub fn exit_requested(&self) -> Option<ExitCode> {
        self.ctx.exit_requested()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.ctx.last_error()
    }

    /// Drain the error messages collected so far.
    pub fn take_diagnostics(&mut self) -> Vec<String> {
        self.ctx.take_diagnostics()
    }

    /// Run one input line and return the exit code of its last statement.
    ///
    /// The line is split on `;` outside quotes and every segment is parsed
    /// and evaluated on its own, so a syntax error in one segment does not
    /// prevent the others from running. Nothing runs after `exit`.
    pub fn execute(&mut self, line: &str) -> ExitCode {
        let code = self.execute_line(line, 1);
        self.finish_line();
        code
    }

    /// Run a script file line by line, returning the last exit code (or the
    /// code given to `exit`). Error messages are prefixed with the script
    /// path and line number.
    pub fn execute_file(&mut self, path: &Path) -> anyhow::Result<ExitCode> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read script {}", path.display()))?;
        tracing::debug!(path = %path.display(), "running script");

        for (index, line) in text.lines().enumerate() {
            if self.exit_requested().is_some() {
                break;
            }
            let first_new = self.ctx.diagnostics().len();
            self.execute_line(line, index + 1);
            self.ctx
                .label_diagnostics_from(first_new, &format!("{}:{}", path.display(), index + 1));
            self.finish_line();
        }
        Ok(self.exit_requested().unwrap_or_else(|| self.exit_code()))
    }

    /// Interactive read-eval-print loop.
    ///
    /// Ctrl-C discards the line being edited, Ctrl-D ends the session. The
    /// prompt is the value of the `prompt` variable. Returns the code the
    /// host should exit with.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;

        loop {
            let prompt = self
                .env()
                .get_var("prompt")
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string());
            match rl.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.execute(&line);
                    if let Some(code) = self.exit_requested() {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(self.exit_code())
    }

    fn execute_line(&mut self, line: &str, line_no: usize) -> ExitCode {
        for (offset, segment) in split_spans(line, ";") {
            if self.exit_requested().is_some() {
                break;
            }
            if segment.trim().is_empty() {
                continue;
            }
            let column = line[..offset].chars().count() + 1;
            self.execute_segment(segment, line_no, column);
        }
        self.exit_code()
    }

    fn execute_segment(&mut self, segment: &str, line: usize, column: usize) -> ExitCode {
        let program = match parse_lexer(Lexer::starting_at(segment, line, column)) {
            Ok(program) => program,
            Err(e) => return self.ctx.report(&ShellError::from(e)),
        };
        tracing::debug!(ast = %AstPrinter::print(&program), "parsed");

        let inherit_stdout = self.stdout.inheritable();
        let mut evaluator = Evaluator::new(
            &mut self.ctx,
            &self.builtins,
            self.runner.as_ref(),
            &mut self.stdout,
            inherit_stdout,
        );
        match evaluator.evaluate(&program) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!("{}", e);
                self.ctx.report(&e)
            }
        }
    }

    fn finish_line(&mut self) {
        if let Err(e) = self.stdout.flush() {
            tracing::warn!("flushing output failed: {}", e);
        }
        if self.report_errors {
            for message in self.ctx.take_diagnostics() {
                eprintln!("[Error]: {}", message);
            }
        }
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default built-ins (`help`, `echo`,
    /// `strfmt`, `cd`, `ls`, `exit`), real child processes and the process's
    /// stdout.
    fn default() -> Self {
        Self::new(
            BuiltinTable::default(),
            Box::new(SystemRunner),
            Box::new(std::io::stdout()),
        )
    }
}
