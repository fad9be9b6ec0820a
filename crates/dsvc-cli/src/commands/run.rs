//! `dsvc run`: Start services, run a command against them, stop them.

use std::process::{Command, ExitCode, ExitStatus};

use anyhow::Context;
use clap::Args;
use dsvc_runtime::cancel::CancellationToken;

use super::StartArgs;
use crate::output;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Startup settings.
    #[command(flatten)]
    pub start: StartArgs,

    /// Command to run once every service is ready.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Executes the `run` command.
///
/// The command's exit code becomes the process exit code.
///
/// # Errors
///
/// Returns an error if the services cannot be started or the command
/// cannot be spawned.
pub fn execute(args: RunArgs) -> anyhow::Result<ExitCode> {
    let services = args.start.source.load()?;
    let cancel = CancellationToken::new();
    super::install_interrupt_handler(&cancel)?;

    output::print_header(&services);
    let mut session = args
        .start
        .builder(&cancel)
        .start()
        .context("failed to start docker services")?;

    let (program, rest) = args
        .command
        .split_first()
        .context("no command given")?;
    tracing::info!(program = %program, "running command");
    let status = Command::new(program)
        .args(rest)
        .envs(session.env().snapshot())
        .status()
        .with_context(|| format!("failed to run `{program}`"));

    if session.keep_alive() {
        eprintln!("Keeping docker services running.");
    } else if let Err(e) = session.teardown() {
        tracing::warn!(error = %e, "some containers could not be stopped");
    }

    Ok(output::exit_code(status_code(status?)))
}

/// Exit code of a finished child, `128 + signal` if it was killed.
fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn status_code_passes_exit_codes_through() {
        let status = Command::new("sh").args(["-c", "exit 7"]).status().unwrap();
        assert_eq!(status_code(status), 7);
    }
}
