//! agtmux-restart: restart decision and the graceful-to-forceful restart
//! protocol for agent panes.

pub mod action;
pub mod error;
pub mod options;
pub mod orchestrator;

pub use action::{
    HardKillResult, PostState, PreCheck, RestartAction, RestartActionKind, RestartSequence,
    RestartSummary, WaitInfo,
};
pub use error::{ErrorCode, ErrorDetails, RestartPhase, StructuredError};
pub use options::{HardKillMode, ProtocolTimings, RestartOptions};
pub use orchestrator::{Decision, RestartOrchestrator, decide, launched_agent};
