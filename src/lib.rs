//! A small interactive command shell.
//!
//! Input lines go through a tokenizer ([`lexer`]), a recursive-descent parser
//! ([`parser`]) producing an [`ast::Program`], and a tree-walking evaluator
//! ([`eval`]) that substitutes `$variables`, short-circuits `&&` and `||`,
//! and connects `|` stages through in-memory buffers.
//!
//! Commands resolve first against a table of built-ins ([`builtin`]) and
//! otherwise run as external programs through a [`external::ProcessRunner`].
//!
//! The main entry point is [`Interpreter`], which owns one session: its
//! variables, current directory, last exit code and error messages.

pub mod ast;
pub mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod external;
pub mod format;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod parser;

#[cfg(test)]
mod testing;

/// Just a convenient re-export of the interactive session.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{DEFAULT_PROMPT, Interpreter};

pub use error::{ShellError, SpawnError};
pub use io_adapters::{MemReader, MemWriter};
