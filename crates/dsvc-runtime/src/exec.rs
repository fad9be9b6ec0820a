//! Bounded execution of engine CLI processes.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

use dsvc_common::error::{Result, ServicesError};
use wait_timeout::ChildExt;

/// Output from a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code returned by the command (`-1` if killed by a signal).
    pub exit_code: i32,
}

impl ExecOutput {
    /// Returns whether the command exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns stdout followed by stderr, trimmed.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim_end();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// Runs `command` to completion, killing it once `timeout` elapses.
///
/// Output pipes are drained on helper threads so a chatty process cannot
/// block on a full pipe while we wait. Returns `Ok(None)` on timeout.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned or waited on.
pub fn run_bounded(command: &mut Command, timeout: Duration) -> Result<Option<ExecOutput>> {
    let program = command.get_program().to_string_lossy().into_owned();
    tracing::debug!(program = %program, args = ?command.get_args().collect::<Vec<_>>(), "spawning");

    let io_err = |e: std::io::Error| ServicesError::Io {
        path: program.clone().into(),
        source: e,
    };

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(io_err)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match child.wait_timeout(timeout).map_err(io_err)? {
        Some(status) => status,
        None => {
            tracing::warn!(program = %program, ?timeout, "command timed out, killing it");
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
    };

    Ok(Some(ExecOutput {
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        exit_code: status.code().unwrap_or(-1),
    }))
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_joins_streams() {
        let out = ExecOutput {
            stdout: "ready\n".into(),
            stderr: "warning\n".into(),
            exit_code: 0,
        };
        assert_eq!(out.combined(), "ready\nwarning");
        assert!(out.success());
    }

    #[test]
    fn combined_skips_empty_stderr() {
        let out = ExecOutput {
            stdout: "only\n".into(),
            ..ExecOutput::default()
        };
        assert_eq!(out.combined(), "only");
    }

    #[cfg(unix)]
    #[test]
    fn run_bounded_captures_output() {
        let out = run_bounded(
            Command::new("sh").args(["-c", "echo hi; echo oops >&2; exit 3"]),
            Duration::from_secs(10),
        )
        .unwrap()
        .unwrap();
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.exit_code, 3);
    }

    #[cfg(unix)]
    #[test]
    fn run_bounded_times_out() {
        let out = run_bounded(Command::new("sleep").arg("5"), Duration::from_millis(100)).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn run_bounded_missing_program_is_io_error() {
        let err = run_bounded(&mut Command::new("/nonexistent/dsvc-no-such-binary"), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ServicesError::Io { .. }));
    }
}
