use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::format::{bytes_to_string, format_print};
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs + 'static {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Alternative names dispatching to the same command.
    fn aliases() -> &'static [&'static str] {
        &[]
    }

    /// Builds the command from the words that followed its name.
    ///
    /// Commands decide which words argh sees as options; see [`parse_values`].
    fn parse(name: &str, args: &[&str]) -> Result<Self, EarlyExit>;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// A [`ShellError`] returned through `anyhow` keeps its classification; any
    /// other error is reported as a runtime error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        <T as BuiltinCommand>::execute(*self, stdin, stdout, env).map_err(|e| {
            match e.downcast::<ShellError>() {
                Ok(classified) => classified,
                Err(other) => ShellError::runtime(format!("{}: {:#}", T::name(), other)),
            }
        })
    }
}

/// Runs argh with `options` first and every word of `values` after `--`, so
/// values are never mistaken for flags or help requests (`echo -5`,
/// `exit -1`, `ls help`).
fn parse_values<T: FromArgs>(
    name: &str,
    options: &[&str],
    values: &[&str],
) -> Result<T, EarlyExit> {
    let mut argv = Vec::with_capacity(options.len() + values.len() + 1);
    argv.extend_from_slice(options);
    argv.push("--");
    argv.extend_from_slice(values);
    T::from_args(&[name], &argv)
}

/// Outcome of an argh parse that did not produce a command: either `--help`
/// output or a usage error.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        if self.is_error {
            return Err(ShellError::argument(self.output.trim_end()));
        }
        stdout
            .write_all(self.output.as_bytes())
            .map_err(|e| ShellError::runtime(e.to_string()))?;
        Ok(0)
    }
}

/// Adapts a [`BuiltinCommand`] type to the object-safe [`CommandFactory`].
pub(crate) struct Factory<T> {
    _marker: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: BuiltinCommand> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn aliases(&self) -> &'static [&'static str] {
        T::aliases()
    }

    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() || T::aliases().contains(&name) {
            Some(match T::parse(name, args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

/// The set of commands the evaluator resolves before falling back to
/// external programs. Lookup is by exact name or alias.
pub struct BuiltinTable {
    factories: Vec<Box<dyn CommandFactory>>,
}

impl BuiltinTable {
    /// A table with no commands; every name goes to the process runner.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Adds a command. Earlier registrations win on name clashes.
    pub fn register(&mut self, factory: Box<dyn CommandFactory>) {
        self.factories.push(factory);
    }

    fn with<T: BuiltinCommand>(mut self) -> Self {
        self.register(Box::new(Factory::<T>::default()));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .iter()
            .any(|f| f.name() == name || f.aliases().contains(&name))
    }

    /// Builds the command registered under `name`, or `None` if no built-in
    /// has that name.
    pub fn create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        self.factories
            .iter()
            .find_map(|f| f.try_create(name, args))
    }

    /// Canonical names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }
}

impl Default for BuiltinTable {
    fn default() -> Self {
        Self::empty()
            .with::<Help>()
            .with::<Echo>()
            .with::<Strfmt>()
            .with::<Cd>()
            .with::<Ls>()
            .with::<Exit>()
    }
}

struct HelpEntry {
    command: &'static str,
    description: &'static str,
    usage: &'static str,
}

const HELP_ENTRIES: &[HelpEntry] = &[
    HelpEntry {
        command: "help",
        description: "Shows the name and description of every command.",
        usage: "help [command]",
    },
    HelpEntry {
        command: "echo",
        description: "Prints the arguments separated by spaces, followed by a new line.",
        usage: "echo [-n] [text...]",
    },
    HelpEntry {
        command: "strfmt",
        description: "Formats and prints the text according to the format string. \
                      Escape sequences (like \\n, \\t) in the format are resolved.",
        usage: "strfmt <format> [arg1 [arg2 [...]]]",
    },
    HelpEntry {
        command: "cd",
        description: "Changes the current directory. Without an argument, goes to $HOME.",
        usage: "cd [directory]",
    },
    HelpEntry {
        command: "ls",
        description: "Lists the files in the current directory, or optionally, in the directory specified.",
        usage: "ls [-a] [-l] [-h] [directory]",
    },
    HelpEntry {
        command: "exit",
        description: "Exits the shell.",
        usage: "exit [code]",
    },
];

#[derive(FromArgs)]
/// Show the name, description and usage of every built-in command.
pub struct Help {
    #[argh(positional)]
    /// only describe this command.
    pub command: Option<String>,
}

impl Help {
    fn write_entry(stdout: &mut dyn Write, entry: &HelpEntry) -> std::io::Result<()> {
        writeln!(stdout, "{}: {}", entry.command, entry.description)?;
        writeln!(stdout, "    Usage: {}", entry.usage)
    }
}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn parse(name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        parse_values(name, &[], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        match self.command {
            None => {
                for entry in HELP_ENTRIES {
                    Self::write_entry(stdout, entry)?;
                    writeln!(stdout)?;
                }
            }
            Some(command) => {
                let entry = HELP_ENTRIES
                    .iter()
                    .find(|e| e.command == command)
                    .ok_or_else(|| {
                        ShellError::runtime(format!("help: command \"{}\" not found", command))
                    })?;
                Self::write_entry(stdout, entry)?;
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    /// Only a leading `-n` is an option; every other word is printed.
    fn parse(name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        match args.split_first() {
            Some((&"-n", rest)) => parse_values(name, &["-n"], rest),
            _ => parse_values(name, &[], args),
        }
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// format and print text like C printf, followed by a newline.
pub struct Strfmt {
    #[argh(positional)]
    /// format string with %s %c %d %i %u %x %X %f placeholders.
    pub format: String,

    #[argh(positional, greedy)]
    /// values substituted into the placeholders in order.
    pub args: Vec<String>,
}

impl BuiltinCommand for Strfmt {
    fn name() -> &'static str {
        "strfmt"
    }

    fn aliases() -> &'static [&'static str] {
        &["printf"]
    }

    fn parse(name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        parse_values(name, &[], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let text = format_print(&self.format, &self.args)
            .map_err(|e| ShellError::runtime(format!("strfmt: {}", e)))?;
        writeln!(stdout, "{}", text)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn aliases() -> &'static [&'static str] {
        &["chdir"]
    }

    fn parse(name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        parse_values(name, &[], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => return Err(ShellError::runtime("cd: no target and HOME not set").into()),
            },
        };

        let new_dir = env.current_dir.join(target);
        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("can't canonicalize {}", new_dir.display()))?;
        if !canonical.is_dir() {
            return Err(ShellError::runtime(format!(
                "cd: {}: not a directory",
                canonical.display()
            ))
            .into());
        }

        tracing::debug!(dir = %canonical.display(), "changing directory");
        env.set_var("PWD", canonical.to_string_lossy());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the entries of a directory.
pub struct Ls {
    #[argh(switch, short = 'l')]
    /// long format: mode, name, modification time and size.
    pub long: bool,

    #[argh(switch, short = 'a')]
    /// include entries whose names start with a dot.
    pub all: bool,

    #[argh(switch, short = 'h')]
    /// print sizes as 1.5K, 2.3M and so on (with -l).
    pub human_readable: bool,

    #[argh(positional)]
    /// directory to list; defaults to the current directory.
    pub directory: Option<String>,
}

struct ListedEntry {
    name: String,
    mode: String,
    modified: String,
    size: Option<u64>,
}

impl Ls {
    fn collect(&self, dir: &std::path::Path) -> Result<Vec<ListedEntry>> {
        let mut entries = Vec::new();
        let read_dir =
            fs::read_dir(dir).with_context(|| format!("cannot open {}", dir.display()))?;
        for entry in read_dir {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.all && name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata()?;
            let file_type = entry.file_type()?;
            let kind = if file_type.is_dir() {
                'd'
            } else if file_type.is_symlink() {
                'l'
            } else {
                '-'
            };
            let mode = format!(
                "{}{}{}",
                kind,
                if meta.permissions().readonly() { 'r' } else { '-' },
                if name.starts_with('.') { 'h' } else { '-' },
            );
            let modified = meta
                .modified()
                .map(|t| {
                    chrono::DateTime::<chrono::Local>::from(t)
                        .format("%Y/%m/%d %H:%M:%S")
                        .to_string()
                })
                .unwrap_or_default();
            entries.push(ListedEntry {
                name,
                mode,
                modified,
                size: meta.is_file().then(|| meta.len()),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn render_size(&self, size: Option<u64>) -> String {
        match size {
            Some(n) if self.human_readable => bytes_to_string(n as i64),
            Some(n) => n.to_string(),
            None => String::new(),
        }
    }
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn aliases() -> &'static [&'static str] {
        &["list"]
    }

    /// Short flags may be combined (`-la`, `-lah`). Other dash words go to
    /// argh as they are, so `--help` prints usage and `-z` is rejected.
    fn parse(name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        let mut options: Vec<String> = Vec::new();
        let mut values = Vec::new();
        let mut options_ended = false;
        for &arg in args {
            if options_ended {
                values.push(arg);
                continue;
            }
            match arg.strip_prefix('-') {
                Some("-") => options_ended = true,
                Some(cluster)
                    if !cluster.is_empty() && cluster.chars().all(|c| "lah".contains(c)) =>
                {
                    for flag in cluster.chars().map(|c| format!("-{}", c)) {
                        if !options.contains(&flag) {
                            options.push(flag);
                        }
                    }
                }
                Some(rest) if !rest.is_empty() => options.push(arg.to_string()),
                _ => values.push(arg),
            }
        }
        let options: Vec<&str> = options.iter().map(String::as_str).collect();
        parse_values(name, &options, &values)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let dir = match &self.directory {
            Some(d) => env.current_dir.join(d),
            None => env.current_dir.clone(),
        };
        let entries = self.collect(&dir)?;

        if !self.long {
            for entry in &entries {
                writeln!(stdout, "{}", entry.name)?;
            }
            return Ok(0);
        }

        let name_len = entries.iter().map(|e| e.name.len()).max().unwrap_or(0).max(4);
        let header = format!(
            "{:<4} | {:<name_len$} | {:<19} | Size",
            "Mode", "Name", "Date Modified"
        );
        writeln!(stdout, "{}", header)?;
        writeln!(stdout, "{}", "-".repeat(header.len()))?;
        for entry in &entries {
            let line = format!(
                "{:<4} | {:<name_len$} | {:<19} | {}",
                entry.mode,
                entry.name,
                entry.modified,
                self.render_size(entry.size)
            );
            writeln!(stdout, "{}", line.trim_end())?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given code (default 0).
pub struct Exit {
    #[argh(positional)]
    /// exit code reported to the parent process.
    pub code: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn parse(name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        parse_values(name, &[], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = match &self.code {
            None => 0,
            Some(raw) => raw.trim().parse::<ExitCode>().map_err(|_| {
                ShellError::runtime(format!("exit: {}: numeric argument required", raw))
            })?,
        };
        env.request_exit(code);
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    fn run(
        env: &mut Environment,
        name: &str,
        args: &[&str],
    ) -> (std::result::Result<ExitCode, ShellError>, String) {
        let table = BuiltinTable::default();
        let cmd = table.create(name, args).expect("builtin should exist");
        let mut out = Vec::new();
        let res = cmd.execute(&mut io::empty(), &mut out, env);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_table_names_and_aliases() {
        let table = BuiltinTable::default();
        assert_eq!(
            table.names(),
            vec!["help", "echo", "strfmt", "cd", "ls", "exit"]
        );
        for name in ["printf", "chdir", "list"] {
            assert!(table.contains(name), "{} should be an alias", name);
        }
        assert!(!table.contains("pwd"));
        assert!(table.create("pwd", &[]).is_none());
        assert!(!BuiltinTable::empty().contains("echo"));
    }

    #[test]
    fn test_echo_with_and_without_newline() {
        let mut env = Environment::with_dir("/");

        // With newline
        let mut out1 = Vec::new();
        let args = vec!["hello".to_string(), "world".to_string()];
        let echo1 = Echo {
            no_newline: false,
            args,
        };
        let res1 = echo1.execute(&mut Cursor::new(Vec::new()), &mut out1, &mut env);

        assert!(res1.is_ok());
        assert_eq!(String::from_utf8(out1).unwrap(), "hello world\n");

        // Without newline
        let (res2, out2) = run(&mut env, "echo", &["-n", "foo", "bar"]);
        assert_eq!(res2.unwrap(), 0);
        assert_eq!(out2, "foo bar");
    }

    #[test]
    fn test_echo_prints_dash_and_help_words_verbatim() {
        let mut env = Environment::with_dir("/");
        for (args, expected) in [
            (&["-5"][..], "-5\n"),
            (&["help"][..], "help\n"),
            (&["--"][..], "--\n"),
            (&["--help"][..], "--help\n"),
            (&["a", "-n"][..], "a -n\n"),
            (&["-n", "-n"][..], "-n"),
        ] {
            let (res, out) = run(&mut env, "echo", args);
            assert_eq!(res.unwrap(), 0, "echo {:?}", args);
            assert_eq!(out, expected, "echo {:?}", args);
        }
    }

    #[test]
    fn test_unknown_flag_is_argument_error() {
        let mut env = Environment::with_dir("/");
        let (res, out) = run(&mut env, "ls", &["-z"]);
        let err = res.unwrap_err();
        assert!(matches!(err, ShellError::Argument(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_help_flag_prints_usage() {
        let mut env = Environment::with_dir("/");
        let (res, out) = run(&mut env, "ls", &["--help"]);
        assert_eq!(res.unwrap(), 0);
        assert!(out.contains("Usage: ls"), "got {:?}", out);
    }

    #[test]
    fn test_help_lists_every_command() {
        let mut env = Environment::with_dir("/");
        let (res, out) = run(&mut env, "help", &[]);
        assert_eq!(res.unwrap(), 0);
        for name in BuiltinTable::default().names() {
            assert!(out.contains(&format!("{}: ", name)), "missing {}", name);
        }

        let (res, out) = run(&mut env, "help", &["exit"]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "exit: Exits the shell.\n    Usage: exit [code]\n");

        let (res, _) = run(&mut env, "help", &["nope"]);
        assert!(matches!(res.unwrap_err(), ShellError::Runtime(_)));
    }

    #[test]
    fn test_strfmt_formats_and_reports_errors() {
        let mut env = Environment::with_dir("/");
        let (res, out) = run(&mut env, "strfmt", &["%s=%d", "x", "42"]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "x=42\n");

        let (res, out) = run(&mut env, "printf", &["%d", "abc"]);
        let err = res.unwrap_err();
        assert!(matches!(err, ShellError::Runtime(_)));
        assert_eq!(err.exit_code(), 2);
        assert!(out.is_empty());

        let (res, _) = run(&mut env, "strfmt", &[]);
        assert!(matches!(res.unwrap_err(), ShellError::Argument(_)));

        let (res, out) = run(&mut env, "strfmt", &["%d|%s", "-5", "--"]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "-5|--\n");
    }

    #[test]
    fn test_cd_relative_updates_session_only() {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        let process_cwd = std::env::current_dir().unwrap();

        let mut env = Environment::with_dir(&root);
        let (res, _) = run(&mut env, "chdir", &["sub"]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(env.current_dir, root.join("sub"));
        assert_eq!(
            env.get_var("PWD"),
            Some(root.join("sub").to_string_lossy().into_owned())
        );
        assert_eq!(std::env::current_dir().unwrap(), process_cwd);

        let (res, _) = run(&mut env, "cd", &[".."]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(env.current_dir, root);
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let tmp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(tmp.path()).unwrap();

        let mut env = Environment::with_dir("/");
        env.set_var("HOME", canonical_temp.to_string_lossy().to_string());

        let cmd = Cd { target: None };
        let res = cmd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_ok());
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let mut env = Environment::with_dir(tmp.path());
        let (res, _) = run(&mut env, "cd", &["does_not_exist"]);
        let err = res.unwrap_err();
        assert!(matches!(err, ShellError::Runtime(_)));
        assert!(err.to_string().starts_with("cd: "), "got {}", err);
        assert_eq!(env.current_dir, tmp.path());
    }

    #[test]
    fn test_cd_too_many_arguments() {
        let mut env = Environment::with_dir("/");
        let (res, _) = run(&mut env, "cd", &["a", "b"]);
        assert!(matches!(res.unwrap_err(), ShellError::Argument(_)));
    }

    fn populated_dir() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), vec![b'x'; 1500]).unwrap();
        fs::write(tmp.path().join("a.txt"), b"hi").unwrap();
        fs::write(tmp.path().join(".hidden"), b"").unwrap();
        fs::create_dir(tmp.path().join("dir")).unwrap();
        tmp
    }

    #[test]
    fn test_ls_hides_dotfiles_unless_all() {
        let tmp = populated_dir();
        let mut env = Environment::with_dir(tmp.path());

        let (res, out) = run(&mut env, "ls", &[]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "a.txt\nb.txt\ndir\n");

        let (res, out) = run(&mut env, "list", &["-a"]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, ".hidden\na.txt\nb.txt\ndir\n");
    }

    #[test]
    fn test_ls_long_format() {
        let tmp = populated_dir();
        let mut env = Environment::with_dir("/");
        let dir = tmp.path().to_string_lossy().into_owned();

        let (res, out) = run(&mut env, "ls", &["-l", "-h", &dir]);
        assert_eq!(res.unwrap(), 0);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2 + 3);
        assert!(lines[0].starts_with("Mode | Name"));
        assert!(lines[1].chars().all(|c| c == '-'));
        assert!(lines[2].contains("a.txt") && lines[2].ends_with("| 2B"));
        assert!(lines[3].contains("b.txt") && lines[3].ends_with("| 1.5K"));
        assert!(lines[4].starts_with("d") && lines[4].ends_with("|"));

        let (_, out) = run(&mut env, "ls", &["-l", &dir]);
        assert!(out.lines().any(|l| l.contains("b.txt") && l.ends_with("| 1500")));
    }

    #[test]
    fn test_ls_combined_flags() {
        let tmp = populated_dir();
        let mut env = Environment::with_dir("/");
        let dir = tmp.path().to_string_lossy().into_owned();

        let (res, separate) = run(&mut env, "ls", &["-l", "-a", &dir]);
        assert_eq!(res.unwrap(), 0);
        for cluster in ["-la", "-al"] {
            let (res, out) = run(&mut env, "list", &[cluster, &dir]);
            assert_eq!(res.unwrap(), 0, "ls {}", cluster);
            assert_eq!(out, separate, "ls {}", cluster);
        }

        let (res, out) = run(&mut env, "ls", &["-lah", &dir]);
        assert_eq!(res.unwrap(), 0);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2 + 4);
        assert!(lines.iter().any(|l| l.contains(".hidden")));
        assert!(lines.iter().any(|l| l.contains("b.txt") && l.ends_with("| 1.5K")));

        let (res, _) = run(&mut env, "ls", &["-lz", &dir]);
        assert!(matches!(res.unwrap_err(), ShellError::Argument(_)));
    }

    #[test]
    fn test_ls_word_help_is_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("help")).unwrap();
        fs::write(tmp.path().join("help").join("inside"), b"").unwrap();
        let mut env = Environment::with_dir(tmp.path());

        let (res, out) = run(&mut env, "ls", &["help"]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "inside\n");

        let (res, out) = run(&mut env, "ls", &["--", "-weird"]);
        let err = res.unwrap_err();
        assert!(err.to_string().contains("-weird"), "got {}", err);
        assert!(out.is_empty());
    }

    #[test]
    fn test_ls_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut env = Environment::with_dir(tmp.path());
        let (res, _) = run(&mut env, "ls", &["nope"]);
        let err = res.unwrap_err();
        assert!(matches!(err, ShellError::Runtime(_)));
        assert!(err.to_string().starts_with("ls: cannot open"));
    }

    #[test]
    fn test_exit_records_request() {
        let mut env = Environment::with_dir("/");
        let (res, _) = run(&mut env, "exit", &["3"]);
        assert_eq!(res.unwrap(), 3);
        assert_eq!(env.exit_request(), Some(3));

        let mut env = Environment::with_dir("/");
        let (res, _) = run(&mut env, "exit", &[]);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(env.exit_request(), Some(0));

        let mut env = Environment::with_dir("/");
        let (res, _) = run(&mut env, "exit", &["abc"]);
        assert_eq!(res.unwrap_err().exit_code(), 2);
        assert_eq!(env.exit_request(), None);

        let mut env = Environment::with_dir("/");
        let (res, _) = run(&mut env, "exit", &["-1"]);
        assert_eq!(res.unwrap(), -1);
        assert_eq!(env.exit_request(), Some(-1));

        let mut env = Environment::with_dir("/");
        let (res, _) = run(&mut env, "exit", &["1", "2"]);
        assert!(matches!(res.unwrap_err(), ShellError::Argument(_)));
        assert_eq!(env.exit_request(), None);
    }
}
