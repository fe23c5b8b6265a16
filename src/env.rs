use crate::command::ExitCode;
use std::collections::BTreeMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Session-scoped state shared by the evaluator and the built-ins.
///
/// The environment contains:
/// - `vars`: shell variables, set by assignments and exported to child processes.
/// - `current_dir`: the working directory of this session. Built-ins resolve
///   relative paths against it and child processes start in it; the host
///   process's own working directory is never changed.
/// - an optional exit request recorded by the `exit` built-in.
///
/// Every session owns its own `Environment`; nothing here is global.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Shell variables, keyed by name.
    pub vars: BTreeMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    exit_request: Option<ExitCode>,
}

impl Environment {
    /// Create an environment with no shell variables, rooted at the process's
    /// current directory.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_dir(current_dir)
    }

    /// Create an empty environment rooted at `current_dir`.
    pub fn with_dir(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: BTreeMap::new(),
            current_dir: current_dir.into(),
            exit_request: None,
        }
    }

    /// Get the value of a variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to the process
    /// environment.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a variable. Last write wins.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Record that the session should end with `code`.
    pub fn request_exit(&mut self, code: ExitCode) {
        self.exit_request = Some(code);
    }

    /// The exit code requested by `exit`, if any.
    pub fn exit_request(&self) -> Option<ExitCode> {
        self.exit_request
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
