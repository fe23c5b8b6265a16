use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs, Debug, Default)]
/// Interactive command shell with variables, `&&`, `||` and pipes.
pub struct Cli {
    #[argh(option, short = 'c')]
    /// run this line before anything else; may be repeated.
    pub command: Vec<String>,

    #[argh(switch, short = 'q')]
    /// do not print the banner on start.
    pub quiet: bool,

    #[argh(switch, short = 'V')]
    /// print version information and exit.
    pub version: bool,

    #[argh(option)]
    /// script executed line by line at startup, if it exists.
    pub rc: Option<PathBuf>,

    #[argh(positional)]
    /// run this script and exit with its last exit code instead of starting the prompt.
    pub script: Option<PathBuf>,
}

/// What the binary does after start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Print the version and stop.
    Version,
    /// Run the given script, then stop.
    Script(PathBuf),
    /// Run only the `-c` lines, then stop.
    Commands,
    /// Read lines from the terminal.
    Interactive,
}

/// Start-up settings folded from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub commands: Vec<String>,
    pub show_banner: bool,
    pub rc_file: Option<PathBuf>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Self {
        let mode = if cli.version {
            Mode::Version
        } else if let Some(script) = cli.script {
            Mode::Script(script)
        } else if !cli.command.is_empty() {
            Mode::Commands
        } else {
            Mode::Interactive
        };
        let show_banner = mode == Mode::Interactive && !cli.quiet;

        Self {
            mode,
            commands: cli.command,
            show_banner,
            rc_file: cli.rc,
        }
    }
}

pub fn banner() -> String {
    format!(
        "{} {}\nType \"help\" for the list of built-in commands.",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}
