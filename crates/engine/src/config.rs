//! Environment configuration
//!
//! One TOML document, normally embedded by the host application or read
//! from a file next to it:
//!
//! ```toml
//! # Results fetched longer ago than this are stale (milliseconds).
//! # Omit to disable time-based expiration.
//! query_cache_expiration_ms = 300000
//!
//! # "immediate" (default) or "deferred"
//! dispatch = "immediate"
//! ```

use recstore_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// When invalidation callbacks run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Drain the notification queue at the end of every commit
    Immediate,
    /// Leave notifications queued until `Environment::flush_notifications`
    Deferred,
}

/// Configuration for an [`Environment`](crate::Environment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Expiration window for fetched results, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_cache_expiration_ms: Option<u64>,
    /// Notification dispatch mode: `"immediate"` or `"deferred"`
    #[serde(default = "default_dispatch_str")]
    pub dispatch: String,
}

fn default_dispatch_str() -> String {
    "immediate".to_string()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            query_cache_expiration_ms: None,
            dispatch: default_dispatch_str(),
        }
    }
}

impl EnvironmentConfig {
    /// Config with an expiration window
    ///
    /// Windows longer than `u64::MAX` milliseconds are clamped.
    pub fn with_expiration(window: Duration) -> Self {
        let millis = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        Self {
            query_cache_expiration_ms: Some(millis),
            ..Self::default()
        }
    }

    /// Switch to deferred dispatch
    pub fn deferred(mut self) -> Self {
        self.dispatch = "deferred".to_string();
        self
    }

    /// Expiration window, `None` if time-based expiration is off
    pub fn expiration(&self) -> Option<Duration> {
        self.query_cache_expiration_ms.map(Duration::from_millis)
    }

    /// Parse the dispatch string
    ///
    /// # Errors
    ///
    /// Returns a config error if the string is not `"immediate"` or `"deferred"`.
    pub fn dispatch_mode(&self) -> Result<DispatchMode> {
        match self.dispatch.as_str() {
            "immediate" => Ok(DispatchMode::Immediate),
            "deferred" => Ok(DispatchMode::Deferred),
            other => Err(Error::config(format!(
                "invalid dispatch mode '{}'. Expected \"immediate\" or \"deferred\".",
                other
            ))),
        }
    }

    /// Check every field
    pub fn validate(&self) -> Result<()> {
        self.dispatch_mode()?;
        Ok(())
    }

    /// Default config document with comments
    pub fn default_toml() -> &'static str {
        r#"# recstore environment configuration
#
# Expiration window for fetched results, in milliseconds.
# Results fetched from the network longer ago than this are stale.
# Leave unset to rely on explicit invalidation only.
# query_cache_expiration_ms = 300000

# When invalidation subscribers are notified:
#   "immediate" = at the end of every commit (default)
#   "deferred"  = when the host calls flush_notifications()
dispatch = "immediate"
"#
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EnvironmentConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML and write to `path`
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
