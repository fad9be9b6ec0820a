//! CLI command definitions and dispatch.

pub mod check;
pub mod plan;
pub mod run;
pub mod up;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dsvc_common::config::{OrchestratorConfig, parse_duration};
use dsvc_common::constants::{DEFAULT_NAMESPACE, DEFAULT_SERVICES_FILE, HOST_OVERRIDE_VAR};
use dsvc_compose::parser::ast::ServiceMap;
use dsvc_runtime::cancel::CancellationToken;
use dsvc_runtime::events::EventSink;
use dsvc_sdk::builder::ServicesBuilder;

use crate::output::ConsoleSink;

/// Starts docker services for a test run and publishes their ports.
#[derive(Parser, Debug)]
#[command(name = "dsvc", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "DSVC_LOG_JSON")]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the services, run a command with their environment, stop them.
    Run(run::RunArgs),
    /// Start the services and keep them until Ctrl+C.
    Up(up::UpArgs),
    /// Validate the declaration and print the startup waves.
    Plan(plan::PlanArgs),
    /// Validate the declaration only.
    Check(check::CheckArgs),
}

/// Where the declaration comes from. Shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Path to the services file.
    #[arg(short, long, env = "DSVC_FILE", default_value = DEFAULT_SERVICES_FILE)]
    pub file: PathBuf,

    /// YAML declaration given inline; takes precedence over `--file`.
    #[arg(long, env = "DSVC_INLINE")]
    pub inline: Option<String>,
}

impl SourceArgs {
    /// Builder preloaded with the declaration source.
    pub fn builder(&self) -> ServicesBuilder {
        match self.inline {
            Some(ref yaml) => ServicesBuilder::new().inline(yaml.clone()),
            None => ServicesBuilder::new().file(self.file.clone()),
        }
    }

    /// Parses the declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    pub fn load(&self) -> anyhow::Result<ServiceMap> {
        self.builder().services().with_context(|| self.describe())
    }

    fn describe(&self) -> String {
        if self.inline.is_some() {
            "invalid inline service declaration".to_string()
        } else {
            format!("invalid service declaration in {}", self.file.display())
        }
    }
}

/// Startup settings shared by commands that start containers.
#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Declaration source.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Prefix of generated container names.
    #[arg(long, env = "DSVC_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Address published in `_ADDR` variables.
    #[arg(long, env = HOST_OVERRIDE_VAR)]
    pub host: Option<String>,

    /// Bound on reaching `running` and `healthy` (e.g. `60s`, `2m`) [default: 60s].
    #[arg(long, env = "DSVC_STARTUP_TIMEOUT", value_parser = duration_arg)]
    pub startup_timeout: Option<Duration>,

    /// Bound on pulling a missing image [default: 300s].
    #[arg(long, env = "DSVC_PULL_TIMEOUT", value_parser = duration_arg)]
    pub pull_timeout: Option<Duration>,

    /// Bound on each setup command [default: 120s].
    #[arg(long, env = "DSVC_SETUP_TIMEOUT", value_parser = duration_arg)]
    pub setup_timeout: Option<Duration>,

    /// Interval between status polls [default: 100ms].
    #[arg(long, env = "DSVC_POLL_INTERVAL", value_parser = duration_arg)]
    pub poll_interval: Option<Duration>,

    /// Leave containers running afterwards.
    #[arg(long)]
    pub keep: bool,
}

impl StartArgs {
    /// Run-wide settings from the flags.
    pub fn config(&self) -> OrchestratorConfig {
        let defaults = OrchestratorConfig::default();
        OrchestratorConfig {
            namespace: self.namespace.clone(),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            startup_timeout: self.startup_timeout.unwrap_or(defaults.startup_timeout),
            pull_timeout: self.pull_timeout.unwrap_or(defaults.pull_timeout),
            setup_timeout: self.setup_timeout.unwrap_or(defaults.setup_timeout),
            keep_alive: self.keep,
            host_override: self.host.clone(),
        }
    }

    /// Builder carrying the declaration, the settings, console progress
    /// output and `cancel`.
    pub fn builder(&self, cancel: &CancellationToken) -> ServicesBuilder {
        let config = self.config();
        let mut builder = self
            .source
            .builder()
            .namespace(config.namespace)
            .poll_interval(config.poll_interval)
            .startup_timeout(config.startup_timeout)
            .pull_timeout(config.pull_timeout)
            .setup_timeout(config.setup_timeout)
            .keep_alive(config.keep_alive)
            .events(Arc::new(ConsoleSink::stderr()) as Arc<dyn EventSink>)
            .cancellation(cancel.clone());
        if let Some(host) = config.host_override {
            builder = builder.host(host);
        }
        builder
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if orchestration fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Run(args) => run::execute(args),
        Command::Up(args) => up::execute(args),
        Command::Plan(args) => plan::execute(&args),
        Command::Check(args) => check::execute(&args),
    }
}

/// Trips `cancel` on Ctrl+C.
///
/// # Errors
///
/// Returns an error if the handler cannot be installed.
pub fn install_interrupt_handler(cancel: &CancellationToken) -> anyhow::Result<()> {
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received");
        token.cancel();
    })
    .context("failed to set Ctrl+C handler")
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use dsvc_common::constants::DEFAULT_PULL_TIMEOUT;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_takes_trailing_command() {
        let cli = Cli::try_parse_from(["dsvc", "run", "-f", "svc.yml", "--keep", "--", "pytest", "-x"]).unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.start.source.file, PathBuf::from("svc.yml"));
                assert!(args.start.keep);
                assert_eq!(args.command, vec!["pytest", "-x"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn durations_are_parsed() {
        let cli = Cli::try_parse_from(["dsvc", "up", "--startup-timeout", "2m", "--poll-interval", "50ms"]).unwrap();
        match cli.command {
            Command::Up(args) => {
                let config = args.start.config();
                assert_eq!(config.startup_timeout, Duration::from_secs(120));
                assert_eq!(config.poll_interval, Duration::from_millis(50));
                assert_eq!(config.pull_timeout, DEFAULT_PULL_TIMEOUT);
                assert_eq!(config.namespace, DEFAULT_NAMESPACE);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(Cli::try_parse_from(["dsvc", "up", "--setup-timeout", "soon"]).is_err());
    }

    #[test]
    fn inline_source_wins() {
        let source = SourceArgs {
            file: PathBuf::from("/nonexistent.yml"),
            inline: Some("db: postgres\n".into()),
        };
        let services = source.load().unwrap();
        assert_eq!(services["db"].image, "postgres");
    }
}
