//! YAML configuration loading for the scripting skill
//!
//! The configuration directory holds a `configuration.yaml` with two
//! sections this workspace cares about:
//!
//! - `scripting:` - runtime settings, see [`SkillSettings`]
//! - `scripts:` - the declarative script document (`name -> triggers, command`)
//!
//! Supported custom tags:
//!
//! - `!include path` - include another YAML file
//! - `!include_dir_merge_named dir` - merge mappings from every YAML file in `dir`
//! - `!env_var VAR [default]` - environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use vs_config::{load_yaml, section, SkillSettings};
//!
//! let config = load_yaml("/config", "configuration.yaml")?;
//! let settings: SkillSettings = section(&config, "scripting")?.unwrap_or_default();
//! ```

mod error;
mod loader;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string, section, YamlLoader, CONFIG_FILE};
pub use settings::SkillSettings;
