//! Agent-type detection from pane metadata and captured output.
//!
//! Each agent type has a detection definition with four signal sources.
//! The strongest matching signal sets the confidence; a title match on its
//! own is never enough because tmux titles go stale after the process
//! changes.

use crate::types::AgentType;

// ─── Weights ─────────────────────────────────────────────────────

pub const WEIGHT_PROCESS_HINT: f64 = 1.00;
pub const WEIGHT_CMD_MATCH: f64 = 0.86;
pub const WEIGHT_CAPTURE_MATCH: f64 = 0.78;
pub const WEIGHT_TITLE_MATCH: f64 = 0.66;

// ─── Definitions ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AgentDetectDef {
    pub agent_type: AgentType,
    /// Substring of the foreground child's command line.
    pub process_hint: &'static str,
    /// Tokens matched in `pane_current_command` (case-insensitive).
    pub cmd_tokens: &'static [&'static str],
    /// Tokens matched in `pane_title` (case-insensitive).
    pub title_tokens: &'static [&'static str],
    /// Tokens matched in captured output (case-insensitive).
    pub capture_tokens: &'static [&'static str],
}

/// Pane metadata input for detection.
#[derive(Debug, Clone, Default)]
pub struct PaneMeta {
    pub pane_title: String,
    pub current_cmd: String,
    /// Command line of the pane's foreground child, when known.
    pub process_hint: Option<String>,
    pub capture_lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult {
    pub agent_type: AgentType,
    pub process_hint: bool,
    pub cmd_match: bool,
    pub title_match: bool,
    pub capture_match: bool,
    pub confidence: f64,
}

pub const DETECT_DEFS: &[AgentDetectDef] = &[
    AgentDetectDef {
        agent_type: AgentType::Claude,
        process_hint: "claude",
        cmd_tokens: &["claude"],
        title_tokens: &["claude", "claude code"],
        capture_tokens: &["claude code", "\u{256D} Claude Code"],
    },
    AgentDetectDef {
        agent_type: AgentType::Codex,
        process_hint: "codex",
        cmd_tokens: &["codex"],
        title_tokens: &["codex", "openai codex"],
        capture_tokens: &["codex>", "openai codex"],
    },
    AgentDetectDef {
        agent_type: AgentType::Gemini,
        process_hint: "gemini",
        cmd_tokens: &["gemini"],
        title_tokens: &["gemini"],
        capture_tokens: &["gemini cli", "using gemini"],
    },
    AgentDetectDef {
        agent_type: AgentType::Cursor,
        process_hint: "cursor-agent",
        cmd_tokens: &["cursor-agent", "cursor"],
        title_tokens: &["cursor"],
        capture_tokens: &["cursor agent"],
    },
    AgentDetectDef {
        agent_type: AgentType::Windsurf,
        process_hint: "windsurf",
        cmd_tokens: &["windsurf"],
        title_tokens: &["windsurf"],
        capture_tokens: &["windsurf"],
    },
    AgentDetectDef {
        agent_type: AgentType::Aider,
        process_hint: "aider",
        cmd_tokens: &["aider"],
        title_tokens: &["aider"],
        capture_tokens: &["aider v", "aider>"],
    },
];

/// Commands that mean the pane is sitting in a plain shell.
const SHELLS: &[&str] = &["bash", "zsh", "fish", "sh", "dash", "ksh", "tcsh", "nu", "pwsh"];

// ─── Detection ──────────────────────────────────────────────────

/// Match one definition against the pane. `None` when nothing matched or
/// only the title did.
pub fn detect(meta: &PaneMeta, def: &AgentDetectDef) -> Option<DetectResult> {
    let mut confidence: f64 = 0.0;

    let process_hint = meta
        .process_hint
        .as_deref()
        .is_some_and(|hint| hint.to_ascii_lowercase().contains(def.process_hint));
    if process_hint {
        confidence = confidence.max(WEIGHT_PROCESS_HINT);
    }

    let cmd = meta.current_cmd.to_ascii_lowercase();
    let cmd_match = def.cmd_tokens.iter().any(|t| cmd.contains(t));
    if cmd_match {
        confidence = confidence.max(WEIGHT_CMD_MATCH);
    }

    let title = meta.pane_title.to_ascii_lowercase();
    let title_match = def.title_tokens.iter().any(|t| title.contains(t));
    if title_match {
        confidence = confidence.max(WEIGHT_TITLE_MATCH);
    }

    let capture_match = meta.capture_lines.iter().any(|line| {
        let lower = line.to_lowercase();
        def.capture_tokens
            .iter()
            .any(|t| lower.contains(&t.to_lowercase()))
    });
    if capture_match {
        confidence = confidence.max(WEIGHT_CAPTURE_MATCH);
    }

    if !(process_hint || cmd_match || capture_match) {
        return None;
    }

    Some(DetectResult {
        agent_type: def.agent_type,
        process_hint,
        cmd_match,
        title_match,
        capture_match,
        confidence,
    })
}

/// Best match across all definitions. Equal confidence is broken by
/// signal strength, then by table order.
pub fn detect_best(meta: &PaneMeta) -> Option<DetectResult> {
    let mut best: Option<DetectResult> = None;
    for def in DETECT_DEFS {
        let Some(result) = detect(meta, def) else {
            continue;
        };
        let dominated = best.as_ref().is_some_and(|current| {
            if current.confidence != result.confidence {
                return current.confidence > result.confidence;
            }
            strength(current) >= strength(&result)
        });
        if !dominated {
            best = Some(result);
        }
    }
    best
}

fn strength(r: &DetectResult) -> (bool, bool, bool, bool) {
    (r.process_hint, r.cmd_match, r.capture_match, r.title_match)
}

/// Agent type for the pane. A pane whose foreground command is a shell
/// and shows no agent evidence is `user`; anything else unmatched is
/// `unknown`.
pub fn detect_agent_type(meta: &PaneMeta) -> AgentType {
    if let Some(found) = detect_best(meta) {
        return found.agent_type;
    }
    let cmd = meta.current_cmd.trim().trim_start_matches('-');
    if SHELLS.contains(&cmd) {
        AgentType::User
    } else {
        AgentType::Unknown
    }
}
