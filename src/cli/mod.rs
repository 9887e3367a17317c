//! The `toolbridge` command-line surface.
//!
//! Every command opens the file-backed services under the configured state
//! directory, runs once and exits. Instances outlive the invoking command:
//! `tools launch` hands each one to a detached host process (see
//! [`host`]), and later commands find it through its persisted descriptor.

mod app;
pub mod args;
mod commands;
mod error;
mod host;
mod render;

pub use args::{Cli, Command, DefineArgs, HostArgs, LaunchArgs, SendArgs, ToolsCommand};
pub use error::CliError;

use crate::logging::{self, LogTarget};
use app::App;
use tokio::runtime::Builder;

/// Runs a parsed command line to completion.
///
/// # Errors
///
/// Returns a [`CliError`] describing the first failure; the binary prints
/// it and exits with status 1.
pub fn run(cli: Cli) -> Result<(), CliError> {
    let settings = crate::config::load(cli.config.as_deref())?;
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let Command::Tools { action } = cli.command;

    if let ToolsCommand::Host(args) = action {
        return runtime.block_on(host::run_host(settings, &args));
    }

    logging::init(&settings.logging.level, LogTarget::Stderr)?;
    let host_pid = matches!(&action, ToolsCommand::Launch(args) if args.foreground)
        .then(std::process::id);
    let app = App::open(settings, host_pid)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    runtime.block_on(commands::execute(&app, cli.config.as_deref(), action, &mut out))
}
