//! Directed keystroke injection via `send-keys`.

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;

/// Send Ctrl-C to the pane.
pub fn send_interrupt(runner: &impl TmuxCommandRunner, pane_id: &str) -> Result<(), TmuxError> {
    runner.run(&["send-keys", "-t", pane_id, "C-c"])?;
    Ok(())
}

/// Send a bare Escape keystroke.
pub fn send_escape(runner: &impl TmuxCommandRunner, pane_id: &str) -> Result<(), TmuxError> {
    runner.run(&["send-keys", "-t", pane_id, "Escape"])?;
    Ok(())
}

pub fn send_enter(runner: &impl TmuxCommandRunner, pane_id: &str) -> Result<(), TmuxError> {
    runner.run(&["send-keys", "-t", pane_id, "Enter"])?;
    Ok(())
}

/// Type `text` literally (`-l`, so words like `Enter` are not key names)
/// and submit it with Enter.
pub fn send_line(
    runner: &impl TmuxCommandRunner,
    pane_id: &str,
    text: &str,
) -> Result<(), TmuxError> {
    runner.run(&["send-keys", "-t", pane_id, "-l", text])?;
    send_enter(runner, pane_id)
}
