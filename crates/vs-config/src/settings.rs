//! Runtime settings from the `scripting:` section

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_lang() -> String {
    "en-us".to_string()
}

fn default_grace_interval() -> f64 {
    0.5
}

/// Settings for the scripting skill
///
/// ```yaml
/// scripting:
///   lang: en-us
///   grace_interval: 0.5      # seconds between non-waiting steps
///   placeholder_default: ""  # text for placeholders with no captured value
///   playback_timeout: 30     # optional watchdog, seconds
///   storage_dir: /var/lib/voice-scripts
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillSettings {
    /// Language tag attached to every utterance request
    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default = "default_grace_interval")]
    pub grace_interval: f64,

    #[serde(default)]
    pub placeholder_default: String,

    /// Unset means a waiting step waits for playback end indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_timeout: Option<f64>,

    /// Where interactive scripts are persisted (defaults to the config dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

impl Default for SkillSettings {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            grace_interval: default_grace_interval(),
            placeholder_default: String::new(),
            playback_timeout: None,
            storage_dir: None,
        }
    }
}

impl SkillSettings {
    /// Reject durations that cannot be represented
    pub fn validate(&self) -> ConfigResult<()> {
        seconds("scripting.grace_interval", self.grace_interval)?;
        if let Some(timeout) = self.playback_timeout {
            seconds("scripting.playback_timeout", timeout)?;
        }
        Ok(())
    }

    pub fn grace_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.grace_interval)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_grace_interval()))
    }

    pub fn playback_timeout(&self) -> Option<Duration> {
        self.playback_timeout
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

fn seconds(key: &str, value: f64) -> ConfigResult<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("{} is not a non-negative number of seconds", value),
    })
}
