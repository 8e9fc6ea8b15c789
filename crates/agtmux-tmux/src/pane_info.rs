//! TmuxPaneInfo, list-panes format string, parser and pane lookups.

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;
use serde::{Deserialize, Serialize};

/// Tab-delimited format string for `tmux list-panes -F`.
pub const LIST_PANES_FORMAT: &str = "#{session_name}\t#{window_index}\t#{pane_index}\t#{pane_id}\t#{pane_current_command}\t#{pane_title}\t#{pane_active}\t#{pane_dead}\t#{pane_pid}";

/// Metadata for a tmux pane as needed by the health engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TmuxPaneInfo {
    pub session_name: String,
    pub window_index: u32,
    pub pane_index: u32,
    pub pane_id: String,
    pub current_cmd: String,
    pub pane_title: String,
    pub active: bool,
    /// tmux keeps a pane open after its process exits when `remain-on-exit` is set.
    pub dead: bool,
    /// PID of the shell (or first process) running in this pane.
    pub pane_pid: Option<u32>,
}

impl TmuxPaneInfo {
    /// `session:window.pane` target string.
    pub fn target(&self) -> String {
        format!(
            "{}:{}.{}",
            self.session_name, self.window_index, self.pane_index
        )
    }
}

/// Execute `tmux list-panes -a` and parse the output.
pub fn list_panes(runner: &impl TmuxCommandRunner) -> Result<Vec<TmuxPaneInfo>, TmuxError> {
    let output = runner.run(&["list-panes", "-a", "-F", LIST_PANES_FORMAT])?;
    parse_list_panes_output(&output)
}

/// List every pane of one session (all windows).
pub fn list_session_panes(
    runner: &impl TmuxCommandRunner,
    session: &str,
) -> Result<Vec<TmuxPaneInfo>, TmuxError> {
    let output = runner.run(&["list-panes", "-s", "-t", session, "-F", LIST_PANES_FORMAT])?;
    parse_list_panes_output(&output)
}

/// Resolve the PID of the process tmux started in the pane.
pub fn pane_pid(runner: &impl TmuxCommandRunner, pane: &str) -> Result<u32, TmuxError> {
    let output = runner.run(&["display-message", "-p", "-t", pane, "#{pane_pid}"])?;
    output
        .trim()
        .parse::<u32>()
        .map_err(|_| TmuxError::CommandFailed(format!("no pane pid for {pane}: {output:?}")))
}

/// Parse the raw output of `tmux list-panes -F <FORMAT>`.
pub fn parse_list_panes_output(output: &str) -> Result<Vec<TmuxPaneInfo>, TmuxError> {
    let mut panes = Vec::new();
    for (idx, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        panes.push(parse_line(line, idx + 1)?);
    }
    Ok(panes)
}

fn parse_line(line: &str, line_num: usize) -> Result<TmuxPaneInfo, TmuxError> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 7 {
        return Err(TmuxError::ParseError {
            line_num,
            detail: format!(
                "expected at least 7 tab-separated fields, got {}",
                parts.len()
            ),
        });
    }

    let window_index = parts[1].trim().parse::<u32>().map_err(|_| TmuxError::ParseError {
        line_num,
        detail: format!("invalid window index {:?}", parts[1]),
    })?;
    let pane_index = parts[2].trim().parse::<u32>().map_err(|_| TmuxError::ParseError {
        line_num,
        detail: format!("invalid pane index {:?}", parts[2]),
    })?;

    Ok(TmuxPaneInfo {
        session_name: parts[0].to_string(),
        window_index,
        pane_index,
        pane_id: parts[3].to_string(),
        current_cmd: parts[4].to_string(),
        pane_title: parts[5].to_string(),
        active: parse_bool(parts[6]),
        dead: parts.get(7).is_some_and(|s| parse_bool(s)),
        pane_pid: parts.get(8).and_then(|s| s.trim().parse().ok()),
    })
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim(), "1" | "true")
}
