use crate::command::ExitCode;
use crate::error::SpawnError;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Everything needed to launch one external program.
#[derive(Debug, Clone)]
pub struct ProcessRequest<'a> {
    /// Program name or path, after variable substitution.
    pub program: &'a str,
    pub args: &'a [String],
    /// Directory the child starts in; also the base for relative program paths.
    pub current_dir: &'a Path,
    /// Shell variables exported to the child on top of the process environment.
    pub vars: &'a BTreeMap<String, String>,
    /// Collect the child's stdout instead of letting it inherit the terminal.
    pub capture_stdout: bool,
    /// Bytes written to the child's stdin, which is then closed. `None`
    /// inherits the shell's stdin.
    pub stdin: Option<Vec<u8>>,
}

/// What a finished program reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: ExitCode,
    /// Present exactly when the request asked for capture.
    pub stdout: Option<Vec<u8>>,
}

/// Spawns external programs on behalf of the evaluator.
///
/// Implementations block until the program has terminated.
pub trait ProcessRunner {
    fn run(&self, request: ProcessRequest<'_>) -> Result<ProcessOutput, SpawnError>;
}

/// Runs programs as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, request: ProcessRequest<'_>) -> Result<ProcessOutput, SpawnError> {
        let search_paths = request
            .vars
            .get("PATH")
            .map(|p| p.clone().into())
            .or_else(|| std::env::var_os("PATH"))
            .unwrap_or_default();

        let executable = find_command_path(&search_paths, Path::new(request.program), request.current_dir)
            .ok_or_else(|| SpawnError::NotFound {
                program: request.program.to_string(),
            })?;
        let io_error = |source| SpawnError::Io {
            program: request.program.to_string(),
            source,
        };

        tracing::debug!(
            program = %executable.display(),
            args = ?request.args,
            capture = request.capture_stdout,
            stdin_bytes = request.stdin.as_ref().map(Vec::len),
            "spawning"
        );

        let mut child = Command::new(executable.as_ref())
            .args(request.args)
            .envs(request.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(request.current_dir)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stdout(if request.capture_stdout {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .spawn()
            .map_err(io_error)?;

        // The payload is written from a helper thread so a child that fills its
        // stdout pipe before draining stdin cannot deadlock us.
        let writer = match (child.stdin.take(), request.stdin) {
            (Some(mut pipe), Some(payload)) => Some(std::thread::spawn(move || {
                // A child that exits without reading stdin closes the pipe early.
                if let Err(e) = pipe.write_all(&payload) {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        tracing::warn!("writing to child stdin failed: {}", e);
                    }
                }
            })),
            _ => None,
        };

        let output = child.wait_with_output().map_err(io_error)?;
        if let Some(writer) = writer {
            if writer.join().is_err() {
                tracing::warn!("stdin writer thread panicked");
            }
        }

        Ok(ProcessOutput {
            code: exit_code(output.status),
            stdout: request.capture_stdout.then_some(output.stdout),
        })
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`) or `./`-prefixed:
///   resolved against `current_dir`, returned if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup or relative resolution.
pub fn find_command_path<'a>(
    search_paths: &OsStr,
    path: &'a Path,
    current_dir: &Path,
) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => {
            // Empty path -> not found
            None
        }
        (Some(x), None) if !path.starts_with("./") => {
            // Single component -> search in PATH
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        _ => {
            // Multiple components -> search in current dir
            let joined = current_dir.join(path);
            find_by_path(&joined).map(|p| Cow::Owned(p.to_path_buf()))
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let path = dir.join(cmd);
        if let Some(path) = find_by_path(&path) {
            return Some(path.to_owned());
        }
    }
    None
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.is_file() { Some(path) } else { None }
}
