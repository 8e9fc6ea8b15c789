//! Per-agent-type registry: graceful exit sequence, idle-prompt matcher and
//! launch command. Adding an agent type means adding one profile.

use std::time::Duration;

use crate::types::AgentType;

// ─── Exit sequences ──────────────────────────────────────────────

/// One step of a graceful exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStep {
    /// Ctrl-C.
    Interrupt,
    Escape,
    /// Literal text followed by Enter.
    Line(&'static str),
    Pause(Duration),
}

const EXIT_PAUSE: Duration = Duration::from_millis(100);

const DOUBLE_INTERRUPT: &[ExitStep] = &[
    ExitStep::Interrupt,
    ExitStep::Pause(EXIT_PAUSE),
    ExitStep::Interrupt,
];
const EXIT_COMMAND: &[ExitStep] = &[ExitStep::Line("/exit")];
const ESCAPE_THEN_EXIT: &[ExitStep] = &[
    ExitStep::Escape,
    ExitStep::Pause(EXIT_PAUSE),
    ExitStep::Line("/exit"),
];
const SINGLE_INTERRUPT: &[ExitStep] = &[ExitStep::Interrupt];

// ─── Prompt matchers ─────────────────────────────────────────────

/// How an idle pane's last non-blank line looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// Conversational agent input line. Box-drawing borders are stripped
    /// before matching.
    Glyph {
        prefixes: &'static [&'static str],
        suffixes: &'static [&'static str],
        markers: &'static [&'static str],
    },
    /// Plain shell prompt.
    Shell,
}

/// Characters a shell prompt ends with.
pub const SHELL_PROMPT_CHARS: &[char] = &['$', '%', '#', '>', '❯', '›'];

/// Lines scanned from the bottom when looking for a prompt.
pub const PROMPT_WINDOW_LINES: usize = 5;

pub const WEIGHT_GLYPH_PROMPT: f64 = 0.8;
pub const WEIGHT_SHELL_PROMPT: f64 = 0.7;

impl PromptStyle {
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Glyph {
                prefixes,
                suffixes,
                markers,
            } => {
                let stripped = line
                    .trim()
                    .trim_matches(|c: char| matches!(c, '│' | '|' | '┃') || c.is_whitespace());
                prefixes.iter().any(|p| stripped.starts_with(p))
                    || suffixes.iter().any(|s| stripped.ends_with(s))
                    || markers.iter().any(|m| line.contains(m))
            }
            Self::Shell => is_shell_prompt_line(line),
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Self::Glyph { .. } => WEIGHT_GLYPH_PROMPT,
            Self::Shell => WEIGHT_SHELL_PROMPT,
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentProfile {
    pub agent_type: AgentType,
    /// Name reported as `exitMethod` in restart audit trails.
    pub exit_method: &'static str,
    pub exit_sequence: &'static [ExitStep],
    pub prompt: PromptStyle,
    pub launch_command: &'static str,
}

/// Launch command used when the pane's agent type is not known.
pub const DEFAULT_LAUNCH_COMMAND: &str = "claude";

const PROFILES: &[AgentProfile] = &[
    AgentProfile {
        agent_type: AgentType::Claude,
        exit_method: "double_interrupt",
        exit_sequence: DOUBLE_INTERRUPT,
        prompt: PromptStyle::Glyph {
            prefixes: &[">", "❯"],
            suffixes: &[],
            markers: &["? for shortcuts"],
        },
        launch_command: "claude",
    },
    AgentProfile {
        agent_type: AgentType::Codex,
        exit_method: "exit_command",
        exit_sequence: EXIT_COMMAND,
        prompt: PromptStyle::Glyph {
            prefixes: &["›", "▌", ">"],
            suffixes: &[],
            markers: &["⏎ send"],
        },
        launch_command: "codex",
    },
    AgentProfile {
        agent_type: AgentType::Gemini,
        exit_method: "escape_then_exit",
        exit_sequence: ESCAPE_THEN_EXIT,
        prompt: PromptStyle::Glyph {
            prefixes: &[">"],
            suffixes: &[],
            markers: &["Type your message"],
        },
        launch_command: "gemini",
    },
    AgentProfile {
        agent_type: AgentType::Cursor,
        exit_method: "double_interrupt",
        exit_sequence: DOUBLE_INTERRUPT,
        prompt: PromptStyle::Glyph {
            prefixes: &["→", ">"],
            suffixes: &[],
            markers: &["Add a follow-up"],
        },
        launch_command: "cursor-agent",
    },
    AgentProfile {
        agent_type: AgentType::Windsurf,
        exit_method: "double_interrupt",
        exit_sequence: DOUBLE_INTERRUPT,
        prompt: PromptStyle::Glyph {
            prefixes: &[">"],
            suffixes: &[],
            markers: &[],
        },
        launch_command: "windsurf",
    },
    AgentProfile {
        agent_type: AgentType::Aider,
        exit_method: "exit_command",
        exit_sequence: EXIT_COMMAND,
        prompt: PromptStyle::Glyph {
            prefixes: &[],
            suffixes: &[">"],
            markers: &[],
        },
        launch_command: "aider",
    },
];

const FALLBACK: AgentProfile = AgentProfile {
    agent_type: AgentType::Unknown,
    exit_method: "interrupt",
    exit_sequence: SINGLE_INTERRUPT,
    prompt: PromptStyle::Shell,
    launch_command: DEFAULT_LAUNCH_COMMAND,
};

const USER_SHELL: AgentProfile = AgentProfile {
    agent_type: AgentType::User,
    ..FALLBACK
};

/// Registry entry for `agent`. User and unknown panes share the shell
/// profile with a single interrupt and the default launch command.
pub fn profile(agent: AgentType) -> &'static AgentProfile {
    match agent {
        AgentType::User => &USER_SHELL,
        other => PROFILES
            .iter()
            .find(|p| p.agent_type == other)
            .unwrap_or(&FALLBACK),
    }
}

// ─── Prompt detection ────────────────────────────────────────────

/// `text` without the empty rows tmux pads a capture with to reach the
/// pane height. Bottom-of-pane windows count from the end of this.
pub fn strip_padding(text: &str) -> &str {
    text.trim_end_matches(['\n', '\r'])
}

/// Last non-blank line among the bottom `window` lines of the unpadded
/// content.
pub fn last_non_blank_line(text: &str, window: usize) -> Option<&str> {
    strip_padding(text)
        .lines()
        .rev()
        .take(window)
        .find(|l| !l.trim().is_empty())
}

pub fn is_shell_prompt_line(line: &str) -> bool {
    line.trim_end().ends_with(SHELL_PROMPT_CHARS)
}

/// True when the bottom of `text` shows a shell prompt.
pub fn looks_like_shell_prompt(text: &str) -> bool {
    last_non_blank_line(text, PROMPT_WINDOW_LINES).is_some_and(is_shell_prompt_line)
}

/// A matched idle prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMatch {
    pub line: String,
    pub weight: f64,
}

/// Agent-specific idle-prompt detection on the last non-blank line.
pub fn idle_prompt(agent: AgentType, text: &str) -> Option<PromptMatch> {
    let prompt = profile(agent).prompt;
    let line = last_non_blank_line(text, PROMPT_WINDOW_LINES)?;
    prompt.matches(line).then(|| PromptMatch {
        line: line.trim().to_string(),
        weight: prompt.weight(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_agent_has_a_profile() {
        for agent in AgentType::AGENTS {
            assert_eq!(profile(agent).agent_type, agent);
        }
        assert_eq!(profile(AgentType::Unknown).launch_command, "claude");
        assert_eq!(profile(AgentType::User).agent_type, AgentType::User);
        assert_eq!(profile(AgentType::User).exit_sequence, SINGLE_INTERRUPT);
    }

    #[test]
    fn exit_sequences_by_agent() {
        assert_eq!(profile(AgentType::Claude).exit_sequence, DOUBLE_INTERRUPT);
        assert_eq!(profile(AgentType::Windsurf).exit_sequence, DOUBLE_INTERRUPT);
        assert_eq!(
            profile(AgentType::Codex).exit_sequence,
            &[ExitStep::Line("/exit")]
        );
        assert_eq!(
            profile(AgentType::Gemini).exit_sequence[0],
            ExitStep::Escape
        );
        assert_eq!(
            profile(AgentType::Gemini).exit_sequence[1],
            ExitStep::Pause(Duration::from_millis(100))
        );
    }

    #[test]
    fn shell_prompt_detection() {
        assert!(looks_like_shell_prompt("ls\nfoo bar\nuser@host:~/src$ \n\n"));
        assert!(looks_like_shell_prompt("~/src ❯"));
        assert!(looks_like_shell_prompt("root@box:/# "));
        assert!(!looks_like_shell_prompt("✻ Thinking… (esc to interrupt)\n"));
        assert!(!looks_like_shell_prompt("\n\n\n"));
    }

    #[test]
    fn prompt_window_stops_at_first_non_blank() {
        // The prompt three lines up is hidden by later output.
        let text = "user@host$ \nsome output\nmore output\n";
        assert!(!looks_like_shell_prompt(text));
        // Whitespace-only rows inside the content still count toward the window.
        let text = "user@host$ \n \n \n \n \n \n";
        assert!(!looks_like_shell_prompt(text));
    }

    #[test]
    fn pane_height_padding_is_ignored() {
        let padded = format!("user@host:~$ echo hi\nhi\nuser@host:~$ {}", "\n".repeat(27));
        assert!(looks_like_shell_prompt(&padded));
        assert_eq!(last_non_blank_line(&padded, PROMPT_WINDOW_LINES), Some("user@host:~$ "));

        let claude = format!("╭───╮\n│ > │\n╰───╯\n  ? for shortcuts{}", "\n".repeat(30));
        assert!(idle_prompt(AgentType::Claude, &claude).is_some());

        let busy = format!("✻ Thinking… (esc to interrupt){}", "\r\n".repeat(12));
        assert!(!looks_like_shell_prompt(&busy));
    }

    #[test]
    fn claude_idle_prompt_inside_box() {
        let text = "╭──────────╮\n│ >        │\n╰──────────╯\n  ? for shortcuts\n";
        let m = idle_prompt(AgentType::Claude, text).expect("idle");
        assert_eq!(m.line, "? for shortcuts");
        assert!((m.weight - WEIGHT_GLYPH_PROMPT).abs() < f64::EPSILON);

        assert!(idle_prompt(AgentType::Claude, "│ > \n").is_some());
        assert!(idle_prompt(AgentType::Claude, "✻ Thinking…\n").is_none());
    }

    #[test]
    fn codex_and_aider_prompts() {
        assert!(idle_prompt(AgentType::Codex, "▌ Ask Codex to do anything\n").is_some());
        assert!(idle_prompt(AgentType::Aider, "architect> \n").is_some());
        assert!(idle_prompt(AgentType::Aider, "Applied edit to main.rs\n").is_none());
    }

    #[test]
    fn unknown_agent_uses_shell_prompt() {
        let m = idle_prompt(AgentType::Unknown, "me@box %").expect("shell");
        assert!((m.weight - WEIGHT_SHELL_PROMPT).abs() < f64::EPSILON);
        assert!(idle_prompt(AgentType::User, "compiling...\n").is_none());
    }
}
