//! `dsvc up`: Start services and keep them until Ctrl+C.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use dsvc_runtime::cancel::CancellationToken;

use super::StartArgs;
use crate::output;

/// Arguments for the `up` command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Startup settings.
    #[command(flatten)]
    pub start: StartArgs,

    /// Write the published variables to this dotenv file instead of
    /// printing `export` lines.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

/// Executes the `up` command.
///
/// # Errors
///
/// Returns an error if the services cannot be started or the env file
/// cannot be written.
pub fn execute(args: UpArgs) -> anyhow::Result<ExitCode> {
    let services = args.start.source.load()?;
    let cancel = CancellationToken::new();
    super::install_interrupt_handler(&cancel)?;

    output::print_header(&services);
    let mut session = args
        .start
        .builder(&cancel)
        .start()
        .context("failed to start docker services")?;

    let vars = session.env().snapshot();
    match args.env_file {
        Some(ref path) => {
            std::fs::write(path, output::dotenv_lines(&vars))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {} variables to {}", vars.len(), path.display());
        }
        None => print!("{}", output::export_lines(&vars)),
    }

    eprintln!("Press Ctrl+C to stop the services...");
    while !cancel.is_cancelled() {
        std::thread::sleep(Duration::from_millis(250));
    }

    if session.keep_alive() {
        eprintln!("Leaving docker services running.");
        return Ok(ExitCode::SUCCESS);
    }
    session.teardown().context("failed to stop every container")?;
    eprintln!("All services stopped.");
    Ok(ExitCode::SUCCESS)
}
