//! agtmux-tmux: tmux and OS process IO boundary.
//! Provides subprocess execution, pane listing/capture, key injection,
//! process-tree inspection and forceful termination. No business logic.

pub mod capture;
pub mod error;
pub mod executor;
pub mod keys;
pub mod pane_info;
pub mod process;

pub use capture::capture_pane;
pub use error::TmuxError;
pub use executor::{TmuxCommandRunner, TmuxExecutor};
pub use keys::{send_enter, send_escape, send_interrupt, send_line};
pub use pane_info::{
    LIST_PANES_FORMAT, TmuxPaneInfo, list_panes, list_session_panes, parse_list_panes_output,
    pane_pid,
};
pub use process::{
    ProcessInfo, ProcessInspector, ProcessMap, RunState, SystemProcesses, immediate_child,
    resolve_child_pid,
};
