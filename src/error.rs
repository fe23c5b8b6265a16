use crate::command::ExitCode;
use crate::lexer::LexError;
use crate::parser::{ParseError, SyntaxError};
use thiserror::Error;

/// Failure to start an external program.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("command not found: {program}")]
    NotFound { program: String },
    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SpawnError::NotFound { .. } => 127,
            SpawnError::Io { .. } => 126,
        }
    }
}

/// Everything that can go wrong while running a line.
///
/// `Lex` and `Parse` abort the line they occur in. `Argument`, `Runtime` and
/// `Spawn` are recovered by the evaluator into an exit code plus a message.
/// `Internal` means the evaluator met a tree it cannot have produced itself.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// Wrong argument count or shape for a built-in.
    #[error("{0}")]
    Argument(String),
    /// A value-level failure inside a built-in or an assignment.
    #[error("{0}")]
    Runtime(String),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShellError {
    pub fn argument(msg: impl Into<String>) -> Self {
        ShellError::Argument(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        ShellError::Runtime(msg.into())
    }

    /// Exit code reported for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ShellError::Argument(_) => 1,
            ShellError::Spawn(e) => e.exit_code(),
            ShellError::Lex(_)
            | ShellError::Parse(_)
            | ShellError::Runtime(_)
            | ShellError::Internal(_) => 2,
        }
    }

    /// True for errors the evaluator turns into an exit code instead of
    /// unwinding.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShellError::Argument(_) | ShellError::Runtime(_) | ShellError::Spawn(_)
        )
    }
}

impl From<SyntaxError> for ShellError {
    fn from(e: SyntaxError) -> Self {
        match e {
            SyntaxError::Lex(e) => ShellError::Lex(e),
            SyntaxError::Parse(e) => ShellError::Parse(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ShellError::argument("x").exit_code(), 1);
        assert_eq!(ShellError::runtime("x").exit_code(), 2);
        let not_found = ShellError::from(SpawnError::NotFound {
            program: "nope".into(),
        });
        assert_eq!(not_found.exit_code(), 127);
        assert_eq!(not_found.to_string(), "command not found: nope");
        assert!(not_found.is_recoverable());
        assert!(!ShellError::Internal("x".into()).is_recoverable());
    }

    #[test]
    fn test_syntax_errors_convert() {
        let err = ShellError::from(SyntaxError::Lex(LexError::InvalidOperator {
            line: 1,
            column: 3,
        }));
        assert_eq!(err.to_string(), "lex error: invalid operator '&' at 1:3");
        assert!(!err.is_recoverable());
    }
}
