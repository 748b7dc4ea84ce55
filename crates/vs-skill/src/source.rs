//! Declarative script sources

use std::path::PathBuf;
use tracing::debug;
use vs_config::{load_yaml, section, ConfigResult, CONFIG_FILE};
use vs_script::DeclarativeScripts;

/// Top-level key of the declarative document
pub const SCRIPTS_SECTION: &str = "scripts";

/// Where declarative scripts are read from on every reload
pub trait DeclarativeSource: Send + Sync {
    fn load(&self) -> ConfigResult<DeclarativeScripts>;
}

/// The `scripts:` section of a YAML file in the config directory
#[derive(Debug, Clone)]
pub struct YamlScriptSource {
    config_dir: PathBuf,
    file: PathBuf,
}

impl YamlScriptSource {
    /// `configuration.yaml` in `config_dir`
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self::with_file(config_dir, CONFIG_FILE)
    }

    pub fn with_file(config_dir: impl Into<PathBuf>, file: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            file: file.into(),
        }
    }
}

impl DeclarativeSource for YamlScriptSource {
    fn load(&self) -> ConfigResult<DeclarativeScripts> {
        let document = load_yaml(self.config_dir.clone(), &self.file)?;
        let scripts: DeclarativeScripts = section(&document, SCRIPTS_SECTION)?.unwrap_or_default();
        debug!(file = ?self.file, count = scripts.len(), "Loaded declarative scripts");
        Ok(scripts)
    }
}

/// A fixed document, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSource(pub DeclarativeScripts);

impl DeclarativeSource for StaticSource {
    fn load(&self) -> ConfigResult<DeclarativeScripts> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use vs_config::ConfigError;

    fn write_config(dir: &TempDir, content: &str) {
        fs::write(dir.path().join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn test_loads_scripts_section_in_order() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
scripting:
  lang: en-us
scripts:
  greet:
    triggers: [hello, hi there]
    command: "Hi there&!one_of(Nice to meet you|Pleasure)"
  night:
    phrases: "good night;sleep well"
    commands: "turn off the lights&&sleep(1)&&good night"
"#,
        );

        let scripts = YamlScriptSource::new(dir.path()).load().unwrap();
        let names: Vec<&String> = scripts.keys().collect();
        assert_eq!(names, vec!["greet", "night"]);
        assert_eq!(scripts["night"].triggers, vec!["good night", "sleep well"]);
    }

    #[test]
    fn test_missing_section_is_empty() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "scripting:\n  lang: en-us\n");

        assert!(YamlScriptSource::new(dir.path()).load().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_entry_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "scripts:\n  greet:\n    triggers: [hello]\n");

        let err = YamlScriptSource::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "scripts"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(YamlScriptSource::new(dir.path()).load().is_err());
    }

    #[test]
    fn test_scripts_from_included_file() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "scripts: !include scripts.yaml\n");
        fs::write(
            dir.path().join("scripts.yaml"),
            "greet:\n  triggers: hello\n  command: Hi\n",
        )
        .unwrap();

        let scripts = YamlScriptSource::new(dir.path()).load().unwrap();
        assert_eq!(scripts["greet"].triggers, vec!["hello"]);
    }
}
