//! Command seam and the `tmux` subprocess executor.
//!
//! Failures are classified here from tmux's stderr so callers match on
//! `PaneNotFound`/`SessionNotFound`/`NoServer` instead of message text.

use std::process::{Command, Output};

use crate::error::TmuxError;

/// Runs one tmux command and returns its stdout. Mock it in tests.
pub trait TmuxCommandRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError>;
}

impl<T: TmuxCommandRunner + ?Sized> TmuxCommandRunner for &T {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        (**self).run(args)
    }
}

/// Spawns a fresh `tmux` client per call, optionally against a specific
/// server socket (`-S`).
#[derive(Debug, Clone)]
pub struct TmuxExecutor {
    program: String,
    socket: Option<String>,
}

impl TmuxExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            socket: None,
        }
    }

    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket = Some(path.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(socket) = &self.socket {
            cmd.arg("-S").arg(socket);
        }
        cmd.args(args);
        cmd
    }
}

impl Default for TmuxExecutor {
    fn default() -> Self {
        Self::new("tmux")
    }
}

impl TmuxCommandRunner for TmuxExecutor {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let output = self.command(args).output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TmuxError::NotFound,
            _ => TmuxError::Io(e),
        })?;
        into_stdout(args, output)
    }
}

fn into_stdout(args: &[&str], output: Output) -> Result<String, TmuxError> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(classify_failure(args, output.status.code(), stderr.trim()))
}

/// Value following `-t`, the command's target.
fn target_of<'a>(args: &[&'a str]) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == "-t").map(|w| w[1])
}

pub(crate) fn classify_failure(args: &[&str], code: Option<i32>, stderr: &str) -> TmuxError {
    let target = target_of(args).unwrap_or_default().to_string();
    if stderr.contains("no server running") || stderr.contains("error connecting to") {
        TmuxError::NoServer(stderr.to_string())
    } else if stderr.contains("can't find session") {
        TmuxError::SessionNotFound(target)
    } else if stderr.contains("can't find pane") || stderr.contains("can't find window") {
        TmuxError::PaneNotFound(target)
    } else {
        let verb = args.first().copied().unwrap_or("tmux");
        TmuxError::CommandFailed(format!(
            "{verb} exited with {}: {stderr}",
            code.map_or_else(|| "signal".to_string(), |c| c.to_string())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_goes_before_the_subcommand() {
        let exec = TmuxExecutor::default().with_socket_path("/tmp/agents.sock");
        let cmd = exec.command(&["list-panes", "-a"]);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["-S", "/tmp/agents.sock", "list-panes", "-a"]);
        assert_eq!(cmd.get_program(), "tmux");
    }

    #[test]
    fn missing_binary_maps_to_not_found() {
        let exec = TmuxExecutor::new("/nonexistent/tmux-binary-for-tests");
        let err = exec.run(&["list-panes"]).expect_err("binary is missing");
        assert!(matches!(err, TmuxError::NotFound));
    }

    #[test]
    fn stderr_is_classified_by_target() {
        let pane = classify_failure(
            &["capture-pane", "-p", "-t", "%7"],
            Some(1),
            "can't find pane: %7",
        );
        assert!(matches!(pane, TmuxError::PaneNotFound(ref p) if p == "%7"));

        let session = classify_failure(
            &["list-panes", "-s", "-t", "gone"],
            Some(1),
            "can't find session: gone",
        );
        assert!(matches!(session, TmuxError::SessionNotFound(ref s) if s == "gone"));

        let server = classify_failure(&["list-panes", "-a"], Some(1), "no server running on /tmp/x");
        assert!(matches!(server, TmuxError::NoServer(_)));

        let other = classify_failure(&["send-keys", "-t", "%1", "C-c"], Some(1), "bad key");
        assert_eq!(other.to_string(), "tmux command failed: send-keys exited with 1: bad key");
    }
}
