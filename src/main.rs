use anyhow::Result;
use appshell::Interpreter;
use appshell::config::{Cli, Config, Mode, banner};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    // RUST_LOG overrides the default level; logs go to stderr, never mixed
    // with command output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli: Cli = argh::from_env();
    let config = Config::from_cli(cli);
    if config.mode == Mode::Version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    install_interrupt_handler()?;

    let mut sh = Interpreter::default().with_error_reporting(true);
    if let Some(rc) = &config.rc_file {
        if rc.is_file() {
            sh.execute_file(rc)?;
        } else {
            tracing::debug!(path = %rc.display(), "rc file not found, skipping");
        }
    }

    for line in &config.commands {
        if sh.exit_requested().is_some() {
            break;
        }
        sh.execute(line);
    }

    let code = match (&config.mode, sh.exit_requested()) {
        (_, Some(code)) => code,
        (Mode::Script(path), None) => sh.execute_file(path)?,
        (Mode::Interactive, None) => {
            if config.show_banner {
                println!("{}", banner());
            }
            sh.repl()?
        }
        (Mode::Commands | Mode::Version, None) => sh.exit_code(),
    };
    std::process::exit(code)
}

/// Keep Ctrl-C from killing the shell itself. The foreground child still
/// receives SIGINT since caught signals are reset to their default on exec.
#[cfg(unix)]
fn install_interrupt_handler() -> Result<()> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    extern "C" fn on_interrupt(_: nix::libc::c_int) {}

    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler is empty and therefore async-signal-safe.
    unsafe { sigaction(Signal::SIGINT, &action) }?;
    Ok(())
}

#[cfg(not(unix))]
fn install_interrupt_handler() -> Result<()> {
    Ok(())
}
