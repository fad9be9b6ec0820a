//! Formatted output helpers for CLI commands.
//!
//! Progress goes to stderr so that stdout stays usable for `export` lines
//! and plans.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::process::ExitCode;
use std::sync::{Mutex, PoisonError};

use dsvc_common::error::ServicesError;
use dsvc_compose::parser::ast::ServiceMap;
use dsvc_runtime::events::{EventSink, ServiceEvent};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Prints lifecycle events as progress lines.
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
    color: bool,
}

impl ConsoleSink {
    /// Sink writing to stderr, colored when stderr is a terminal.
    pub fn stderr() -> Self {
        let color = std::io::stderr().is_terminal();
        Self::new(Box::new(std::io::stderr()), color)
    }

    fn new(out: Box<dyn Write + Send>, color: bool) -> Self {
        Self {
            out: Mutex::new(out),
            color,
        }
    }

    fn style(event: &ServiceEvent) -> &'static str {
        match event {
            ServiceEvent::Launching { .. } => BOLD,
            ServiceEvent::Published { .. } => GREEN,
            ServiceEvent::Failed { .. } => RED,
            ServiceEvent::PullingImage { .. } | ServiceEvent::WaitingForHealthy { .. } => YELLOW,
            _ => DIM,
        }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: &ServiceEvent) {
        let line = if self.color {
            format!("{}{event}{RESET}", Self::style(event))
        } else {
            event.to_string()
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}") {
            tracing::debug!(error = %e, "cannot write progress line");
        }
    }
}

/// Prints the startup banner.
pub fn print_header(services: &ServiceMap) {
    eprintln!("Launching docker services: {}", services.len());
}

/// Prints an orchestration error with its causes.
pub fn print_error(error: &anyhow::Error) {
    let color = std::io::stderr().is_terminal();
    if color {
        eprintln!("{RED}{BOLD}error:{RESET} {error:#}");
    } else {
        eprintln!("error: {error:#}");
    }
    let before_start = error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ServicesError>())
        .any(ServicesError::is_declaration_error);
    if before_start {
        eprintln!("No container was started.");
    }
}

/// Converts a process exit code to an [`ExitCode`], clamping to `1` when
/// it does not fit a byte.
pub fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(clamp_exit_code(code))
}

fn clamp_exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

/// Quotes `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Renders variables as `export` lines for `eval`.
pub fn export_lines(vars: &BTreeMap<String, String>) -> String {
    vars.iter()
        .map(|(k, v)| format!("export {k}={}\n", shell_quote(v)))
        .collect()
}

/// Renders variables as a dotenv file.
pub fn dotenv_lines(vars: &BTreeMap<String, String>) -> String {
    vars.iter()
        .map(|(k, v)| format!("{k}={}\n", shell_quote(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn console_sink_prints_plain_lines() {
        let buffer = Shared::default();
        let sink = ConsoleSink::new(Box::new(buffer.clone()), false);
        sink.emit(&ServiceEvent::Launching {
            service: "postgres".into(),
            image: "postgres:16".into(),
        });
        sink.emit(&ServiceEvent::PullingImage {
            service: "postgres".into(),
            image: "postgres:16".into(),
        });
        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "postgres postgres:16\n    pulling image: postgres:16\n");
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn export_lines_are_sorted_and_quoted() {
        let vars = BTreeMap::from([
            ("B".to_string(), "2".to_string()),
            ("A".to_string(), "x y".to_string()),
        ]);
        assert_eq!(export_lines(&vars), "export A='x y'\nexport B='2'\n");
        assert_eq!(dotenv_lines(&vars), "A='x y'\nB='2'\n");
    }

    #[test]
    fn exit_codes_are_clamped() {
        assert_eq!(clamp_exit_code(3), 3);
        assert_eq!(clamp_exit_code(-1), 1);
        assert_eq!(clamp_exit_code(300), 1);
    }
}
