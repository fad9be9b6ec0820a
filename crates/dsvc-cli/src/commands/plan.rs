//! `dsvc plan`: Print the startup waves without starting anything.

use std::fmt::Write;
use std::process::ExitCode;

use clap::Args;
use dsvc_compose::parser::ast::ServiceMap;
use dsvc_runtime::engine::Engine;

use super::SourceArgs;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Declaration source.
    #[command(flatten)]
    pub source: SourceArgs,
}

/// Executes the `plan` command.
///
/// # Errors
///
/// Returns an error if the declaration is invalid.
pub fn execute(args: &PlanArgs) -> anyhow::Result<ExitCode> {
    let services = args.source.load()?;
    let waves = Engine::plan(&services)?;
    print!("{}", render(&services, &waves));
    Ok(ExitCode::SUCCESS)
}

fn render(services: &ServiceMap, waves: &[Vec<String>]) -> String {
    let mut out = String::new();
    for (index, wave) in waves.iter().enumerate() {
        let _ = writeln!(out, "wave {}:", index + 1);
        for name in wave {
            let Some(spec) = services.get(name) else {
                continue;
            };
            let _ = write!(out, "  {name} ({})", spec.image);
            if !spec.requires.is_empty() {
                let _ = write!(out, " requires {}", spec.requires.join(", "));
            }
            if !spec.setup_commands.is_empty() {
                let _ = write!(out, ", {} setup command(s)", spec.setup_commands.len());
            }
            out.push('\n');
        }
    }
    out
}
