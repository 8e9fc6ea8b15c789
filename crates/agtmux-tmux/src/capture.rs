//! Pane output capture.

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;

/// Bottom `lines` lines of a pane's visible history, wrapped lines joined
/// (`-J`) so a long status line matches as one.
pub fn capture_pane(
    runner: &impl TmuxCommandRunner,
    pane_id: &str,
    lines: u32,
) -> Result<String, TmuxError> {
    let start = format!("-{}", lines.max(1));
    runner.run(&["capture-pane", "-p", "-J", "-S", &start, "-t", pane_id])
}
