//! Declarative terminal-text signal table.
//!
//! Every heuristic the classifier and error check rely on is a row in
//! [`SIGNAL_DEFS`]: a case-insensitive regex, the category it votes for and
//! the confidence it carries. New behaviours are new rows.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ─── Definitions ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    RateLimit,
    Error,
    Working,
}

/// One row of the signal table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDef {
    pub category: SignalCategory,
    /// Short stable name reported as evidence.
    pub label: &'static str,
    /// Regex source; compiled case-insensitive and multi-line.
    pub pattern: &'static str,
    /// Confidence this signal contributes, in `[0, 1]`.
    pub weight: f64,
}

const fn def(
    category: SignalCategory,
    label: &'static str,
    pattern: &'static str,
    weight: f64,
) -> SignalDef {
    SignalDef {
        category,
        label,
        pattern,
        weight,
    }
}

use SignalCategory::{Error, RateLimit, Working};

/// Built-in signals. Order matters within a category: the first matching
/// row wins for rate-limit detection.
pub const SIGNAL_DEFS: &[SignalDef] = &[
    // Rate limits
    def(RateLimit, "rate_limit", r"rate[ _-]?limit(?:ed|s)?\b", 0.95),
    def(RateLimit, "usage_limit", r"usage limit", 0.95),
    def(RateLimit, "limit_reached", r"(?:hit|reached) (?:your|the) (?:\w+ )?limit", 0.9),
    def(RateLimit, "too_many_requests", r"too many requests", 0.9),
    def(RateLimit, "quota_exceeded", r"quota (?:exceeded|exhausted)", 0.9),
    def(RateLimit, "resource_exhausted", r"resource[_ ]exhausted", 0.9),
    def(RateLimit, "limit_exceeded", r"limit (?:reached|exceeded)", 0.85),
    def(RateLimit, "http_429", r"\b429\b", 0.7),
    // Errors
    def(Error, "error_line", r"^\s*(?:error|err!)[:\]]", 0.7),
    def(Error, "api_error", r"\bapi error\b", 0.8),
    def(Error, "panic", r"\bpanic(?:ked)?\b", 0.8),
    def(Error, "fatal", r"\bfatal\b", 0.8),
    def(Error, "traceback", r"traceback \(most recent call last\)", 0.8),
    def(Error, "unhandled", r"unhandled (?:exception|rejection|error)", 0.8),
    def(Error, "auth_failed", r"authentication (?:failed|error)|invalid api key", 0.85),
    def(Error, "connection", r"connection (?:refused|reset|closed unexpectedly)", 0.7),
    def(Error, "overloaded", r"\boverloaded\b", 0.7),
    // Working
    def(Working, "esc_to_interrupt", r"esc to interrupt", 0.95),
    def(Working, "ctrl_c_to_interrupt", r"ctrl\+c to (?:interrupt|cancel)", 0.9),
    def(Working, "spinner", r"[⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏]", 0.85),
    def(Working, "status_glyph", r"^\s*[✻✽✶✳✢]\s+\w+", 0.85),
    def(
        Working,
        "progress_verb",
        r"\b(?:thinking|generating|analyzing|processing|reasoning|working)(?:\.\.\.|…)",
        0.75,
    ),
    def(Working, "tool_running", r"\brunning\b.*(?:\.\.\.|…)", 0.6),
];

// ─── Compiled table ──────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CompiledSignal {
    def: SignalDef,
    regex: Regex,
}

/// A single hit against the table.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMatch {
    pub category: SignalCategory,
    pub label: &'static str,
    /// The matched text, trimmed.
    pub text: String,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct SignalTable {
    signals: Vec<CompiledSignal>,
}

static BUILTIN: LazyLock<SignalTable> = LazyLock::new(|| {
    SignalTable::from_defs(SIGNAL_DEFS).expect("built-in signal patterns must compile")
});

impl SignalTable {
    /// The process-wide compiled copy of [`SIGNAL_DEFS`].
    pub fn builtin() -> &'static SignalTable {
        &BUILTIN
    }

    pub fn from_defs(defs: &[SignalDef]) -> Result<Self, regex::Error> {
        let signals = defs
            .iter()
            .map(|d| {
                Ok(CompiledSignal {
                    def: *d,
                    regex: Regex::new(&format!("(?im){}", d.pattern))?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { signals })
    }

    /// First row of `category` (table order) that matches anywhere in `text`.
    pub fn first_match(&self, category: SignalCategory, text: &str) -> Option<SignalMatch> {
        self.signals
            .iter()
            .filter(|s| s.def.category == category)
            .find_map(|s| s.regex.find(text).map(|m| to_match(&s.def, m.as_str())))
    }

    /// Every row of `category` that matches, one entry per row.
    pub fn all_matches(&self, category: SignalCategory, text: &str) -> Vec<SignalMatch> {
        self.signals
            .iter()
            .filter(|s| s.def.category == category)
            .filter_map(|s| s.regex.find(text).map(|m| to_match(&s.def, m.as_str())))
            .collect()
    }
}

fn to_match(def: &SignalDef, text: &str) -> SignalMatch {
    SignalMatch {
        category: def.category,
        label: def.label,
        text: text.trim().to_string(),
        weight: def.weight,
    }
}

// ─── Extractors ──────────────────────────────────────────────────

/// Largest wait the extractor reports; anything longer is treated as noise.
pub const MAX_WAIT_SECONDS: u64 = 3600;

static WAIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:wait|retry(?:ing)? (?:after|in)|try again in|resets? in)\s+(\d+)(?:\s*(?:or|to|-)\s*\d+)?\s*(seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h)?\b",
    )
    .expect("wait regex must compile")
});

/// Extract a suggested wait from rate-limit text, in seconds.
///
/// Takes the first number of the first phrase (`"wait 30 or 60 seconds"`
/// is 30). Returns 0 when nothing is found or the value exceeds
/// [`MAX_WAIT_SECONDS`].
pub fn parse_wait_seconds(text: &str) -> u64 {
    let Some(caps) = WAIT_RE.captures(text) else {
        return 0;
    };
    let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) else {
        return 0;
    };
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(unit) if unit.starts_with('h') => 3600,
        Some(unit) if unit.starts_with('m') => 60,
        _ => 1,
    };
    let seconds = value.saturating_mul(multiplier);
    if seconds > MAX_WAIT_SECONDS { 0 } else { seconds }
}

static CONTEXT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)context left until auto-compact:\s*(\d+(?:\.\d+)?)\s*%",
        r"(?i)(\d+(?:\.\d+)?)\s*%\s*context\s+(?:left|remaining)",
        r"(?i)context(?: window)?:?\s*(\d+(?:\.\d+)?)\s*%\s*(?:left|remaining|free)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("context regex must compile"))
    .collect()
});

/// Remaining-context percentage reported by the agent, if visible.
/// The match closest to the end of `text` wins.
pub fn parse_context_remaining(text: &str) -> Option<f64> {
    CONTEXT_RES
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| {
            let m = caps.get(1)?;
            let pct = m.as_str().parse::<f64>().ok()?;
            Some((m.start(), pct.clamp(0.0, 100.0)))
        })
        .max_by_key(|(pos, _)| *pos)
        .map(|(_, pct)| pct)
}
