use crate::env::Environment;
use crate::error::ShellError;
use crate::io_adapters::MemWriter;
use std::io::{self, Read, Write};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// The terminal-side output sink of a session.
///
/// When the sink is the real process stdout, external programs that are not
/// part of a pipe write to it directly. Any other sink makes the evaluator
/// capture the child's output and copy it into the sink.
pub trait Stdout: Write {
    /// Whether child processes may inherit this stream as their stdout.
    fn inheritable(&self) -> bool {
        false
    }
}

impl Stdout for io::Stdout {
    fn inheritable(&self) -> bool {
        true
    }
}

impl Stdout for MemWriter {}

impl Stdout for Vec<u8> {}

/// Object-safe trait for any command that can be executed in-process.
pub trait ExecutableCommand {
    /// Executes the command.
    ///
    /// `stdin` is the pending pipe buffer when the command sits on the right of
    /// a `|`; `stdout` is either the pipe capture buffer or the session sink.
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Canonical name of the command this factory builds.
    fn name(&self) -> &'static str;

    /// Other names the command answers to.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
