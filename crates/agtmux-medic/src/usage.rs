//! Provider usage lookup. Best-effort: a slow, missing or broken source
//! degrades scoring and never blocks classification.

use std::path::PathBuf;
use std::time::Duration;

use agtmux_health::{AgentType, UsageSnapshot};
use anyhow::Context;
use tokio::sync::OnceCell;

use crate::config::{UsageOptions, UsageSource};

/// Source of per-provider account usage.
pub trait UsageProvider {
    async fn usage(&self, provider: &str) -> anyhow::Result<Option<UsageSnapshot>>;
}

/// Reads a JSON array of snapshots once per invocation.
pub struct FileUsageProvider {
    path: PathBuf,
    cache: OnceCell<Vec<UsageSnapshot>>,
}

impl FileUsageProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    async fn load(&self) -> anyhow::Result<&[UsageSnapshot]> {
        let snapshots = self
            .cache
            .get_or_try_init(|| async {
                let raw = tokio::fs::read_to_string(&self.path)
                    .await
                    .with_context(|| format!("reading usage file {}", self.path.display()))?;
                parse_usage(&raw)
            })
            .await?;
        Ok(snapshots.as_slice())
    }
}

impl UsageProvider for FileUsageProvider {
    async fn usage(&self, provider: &str) -> anyhow::Result<Option<UsageSnapshot>> {
        Ok(self
            .load()
            .await?
            .iter()
            .find(|u| u.provider.eq_ignore_ascii_case(provider))
            .cloned())
    }
}

pub fn parse_usage(raw: &str) -> anyhow::Result<Vec<UsageSnapshot>> {
    serde_json::from_str(raw).context("usage data must be a JSON array of snapshots")
}

/// The configured usage source.
pub enum Usage {
    Disabled,
    File(FileUsageProvider),
}

impl Usage {
    pub fn from_options(options: &UsageOptions) -> Self {
        match &options.source {
            UsageSource::Disabled => Self::Disabled,
            UsageSource::File(path) => Self::File(FileUsageProvider::new(path.clone())),
        }
    }
}

impl UsageProvider for Usage {
    async fn usage(&self, provider: &str) -> anyhow::Result<Option<UsageSnapshot>> {
        match self {
            Self::Disabled => Ok(None),
            Self::File(file) => file.usage(provider).await,
        }
    }
}

/// Usage for the agent's provider, or `None` when the agent has no
/// provider, the source has no entry, fails, or exceeds `timeout`.
pub async fn lookup_usage(
    provider: &impl UsageProvider,
    agent_type: AgentType,
    timeout: Duration,
) -> Option<UsageSnapshot> {
    let name = agent_type.provider()?;
    match tokio::time::timeout(timeout, provider.usage(name)).await {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => {
            tracing::warn!(provider = name, error = %format!("{e:#}"), "usage lookup failed");
            None
        }
        Err(_) => {
            tracing::warn!(provider = name, timeout_ms = millis(timeout), "usage lookup timed out");
            None
        }
    }
}

/// Whole milliseconds, saturating.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
