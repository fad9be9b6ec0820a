//! `dsvc check`: Validate a declaration.

use std::process::ExitCode;

use clap::Args;
use dsvc_runtime::engine::Engine;

use super::SourceArgs;

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Declaration source.
    #[command(flatten)]
    pub source: SourceArgs,
}

/// Executes the `check` command.
///
/// # Errors
///
/// Returns an error if the declaration is invalid.
pub fn execute(args: &CheckArgs) -> anyhow::Result<ExitCode> {
    let services = args.source.load()?;
    let waves = Engine::plan(&services)?;
    eprintln!("{} service(s) in {} wave(s): OK", services.len(), waves.len());
    Ok(ExitCode::SUCCESS)
}
