//! Test doubles shared by the unit tests.

use crate::command::ExitCode;
use crate::error::SpawnError;
use crate::external::{ProcessOutput, ProcessRequest, ProcessRunner};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// One recorded call to [`FakeRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    pub capture: bool,
    pub stdin: Option<String>,
}

/// Scripted stand-in for real programs:
///
/// - `true` / `false` exit with 0 / 1
/// - `emit a b` prints its arguments and a newline
/// - `upper` prints its stdin uppercased
/// - `status N` exits with `N`
///
/// Anything else is reported as not found. Clones share the call log.
#[derive(Default, Clone)]
pub(crate) struct FakeRunner {
    calls: Rc<RefCell<Vec<Invocation>>>,
}

impl FakeRunner {
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.program.clone()).collect()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, request: ProcessRequest<'_>) -> Result<ProcessOutput, SpawnError> {
        let stdin = request
            .stdin
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned());
        self.calls.borrow_mut().push(Invocation {
            program: request.program.to_string(),
            args: request.args.to_vec(),
            current_dir: request.current_dir.to_path_buf(),
            capture: request.capture_stdout,
            stdin: stdin.clone(),
        });

        let (code, output): (ExitCode, String) = match request.program {
            "true" => (0, String::new()),
            "false" => (1, String::new()),
            "emit" => (0, format!("{}\n", request.args.join(" "))),
            "upper" => (0, stdin.unwrap_or_default().to_uppercase()),
            "status" => (
                request.args.first().and_then(|a| a.parse().ok()).unwrap_or(0),
                String::new(),
            ),
            other => {
                return Err(SpawnError::NotFound {
                    program: other.to_string(),
                });
            }
        };

        Ok(ProcessOutput {
            code,
            stdout: request.capture_stdout.then(|| output.into_bytes()),
        })
    }
}
