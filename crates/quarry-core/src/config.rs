use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QuarryError, Result};

/// Top-level Quarry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarryConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub sample: SampleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Deadline applied to every `get` call, in milliseconds. Unset means
    /// resolution is bounded only by the caller's token.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    /// Capacity of the resolution event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl ResolverConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            deadline_ms: None,
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_event_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default `tracing` filter; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "quarry=info,warn".to_string()
}

/// Request used by the `sample` command when no flags override it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    #[serde(default = "default_sample_token")]
    pub token: String,
    #[serde(default = "default_show_unread")]
    pub show_unread: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            token: default_sample_token(),
            show_unread: default_show_unread(),
        }
    }
}

fn default_sample_token() -> String {
    "0xdeadbeef".to_string()
}

fn default_show_unread() -> bool {
    true
}

impl QuarryConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| QuarryError::ConfigNotFound(path.display().to_string()))?;
        debug!(path = %path.display(), "Loaded config file");
        Self::parse(&content)
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| QuarryError::Config(e.to_string()))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
