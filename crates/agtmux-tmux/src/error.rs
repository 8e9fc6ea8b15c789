//! Error types for the tmux / process boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux command failed: {0}")]
    CommandFailed(String),

    #[error("tmux binary not found")]
    NotFound,

    #[error("no tmux server: {0}")]
    NoServer(String),

    #[error("pane not found: {0}")]
    PaneNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("failed to parse list-panes line {line_num}: {detail}")]
    ParseError { line_num: usize, detail: String },

    #[error("process command failed: {0}")]
    ProcessFailed(String),

    #[error("failed to signal pid {pid}: {detail}")]
    SignalFailed { pid: u32, detail: String },

    #[error("tmux io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TmuxError {
    /// True for "the target does not exist" style failures, which callers
    /// report as input errors rather than runtime faults.
    pub fn is_missing_target(&self) -> bool {
        matches!(self, Self::PaneNotFound(_) | Self::SessionNotFound(_))
    }
}
