use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_CONFIG_FILE: &str = "muster.json";

/// Console settings. Every field has a default, so a config file only lists overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub push_path: String,
    pub page_size: usize,
    pub reconnect_delay_ms: u64,
    pub commit_grace_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_interval_secs: Option<u64>,
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            push_path: "/ws/marines".to_string(),
            page_size: 10,
            reconnect_delay_ms: 3000,
            commit_grace_ms: 100,
            ping_interval_secs: None,
            request_timeout_secs: 10,
            log_file: None,
        }
    }
}

impl ConsoleConfig {
    /// Reads `path`, or `./muster.json` when no path is given and that file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: ConsoleConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validated()
    }

    pub fn validated(mut self) -> Result<Self> {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            anyhow::bail!(
                "base_url must start with http:// or https:// (got `{}`)",
                self.base_url
            );
        }
        if !self.push_path.starts_with('/') {
            self.push_path = format!("/{}", self.push_path);
        }
        if !(1..=crate::view::MAX_PAGE_SIZE).contains(&self.page_size) {
            anyhow::bail!(
                "page_size must be between 1 and {} (got {})",
                crate::view::MAX_PAGE_SIZE,
                self.page_size
            );
        }
        Ok(self)
    }

    /// Websocket URL of the push channel, derived from `base_url`.
    pub fn push_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", ws_base, self.push_path)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn commit_grace(&self) -> Duration {
        Duration::from_millis(self.commit_grace_ms)
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        self.ping_interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn channel_settings(&self) -> crate::channel::ChannelSettings {
        crate::channel::ChannelSettings {
            reconnect_delay: self.reconnect_delay(),
            ping_interval: self.ping_interval(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
