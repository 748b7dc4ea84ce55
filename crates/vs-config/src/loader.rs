//! `configuration.yaml` loading
//!
//! Documents are parsed with `serde_yaml` and then walked once to expand the
//! custom tags. Paths in tags are relative to the file that contains them.

use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Name of the main configuration file inside the config directory
pub const CONFIG_FILE: &str = "configuration.yaml";

/// Custom tags understood by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    /// `!include file.yaml`
    Include,
    /// `!include_dir_merge_named dir`, one mapping merged from every YAML file
    IncludeDirMergeNamed,
    /// `!env_var NAME [default]`
    EnvVar,
}

impl Tag {
    fn parse(tag: &str) -> Option<Self> {
        match tag.trim_start_matches('!') {
            "include" => Some(Tag::Include),
            "include_dir_merge_named" => Some(Tag::IncludeDirMergeNamed),
            "env_var" => Some(Tag::EnvVar),
            _ => None,
        }
    }
}

/// Loader for one configuration directory
pub struct YamlLoader {
    config_dir: PathBuf,
    /// Files being expanded, outermost first
    open_files: Vec<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            open_files: Vec::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Read and expand a file; relative paths start at the config directory
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.config_dir.join(path.as_ref());
        if self.open_files.contains(&path) {
            return Err(ConfigError::IncludeCycle { path });
        }

        debug!(path = %path.display(), "Reading YAML");
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        self.open_files.push(path.clone());
        let loaded = self.load_string(&text, &path);
        self.open_files.pop();
        loaded
    }

    /// Parse and expand `text`, treating it as the content of `origin`
    pub fn load_string(&mut self, text: &str, origin: &Path) -> ConfigResult<Value> {
        let document = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;
        self.expand(document, origin)
    }

    fn expand(&mut self, value: Value, origin: &Path) -> ConfigResult<Value> {
        Ok(match value {
            Value::Tagged(tagged) => self.expand_tagged(*tagged, origin)?,
            Value::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| self.expand(item, origin))
                    .collect::<ConfigResult<_>>()?,
            ),
            Value::Mapping(entries) => {
                let mut expanded = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    expanded.insert(self.expand(key, origin)?, self.expand(value, origin)?);
                }
                Value::Mapping(expanded)
            }
            scalar => scalar,
        })
    }

    fn expand_tagged(&mut self, tagged: TaggedValue, origin: &Path) -> ConfigResult<Value> {
        let Some(tag) = Tag::parse(&tagged.tag.to_string()) else {
            // foreign tags survive, their content is still expanded
            let value = self.expand(tagged.value, origin)?;
            return Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value,
            })));
        };

        trace!(?tag, "Expanding tag");
        match tag {
            Tag::Include => {
                let target = relative_target(&tagged.value, origin)?;
                self.load_file(target)
            }
            Tag::IncludeDirMergeNamed => {
                let dir = relative_target(&tagged.value, origin)?;
                self.merge_dir(&dir)
            }
            Tag::EnvVar => env_var(&tagged.value),
        }
    }

    /// Top-level mappings of every `*.yaml` / `*.yml` in `dir`, by file name
    ///
    /// On duplicate keys the later file wins.
    fn merge_dir(&mut self, dir: &Path) -> ConfigResult<Value> {
        if !dir.is_dir() {
            return Err(ConfigError::MissingDirectory {
                path: dir.to_path_buf(),
            });
        }

        let entries = fs::read_dir(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml" | "yml")
                )
            })
            .collect();
        files.sort();

        let mut merged = Mapping::new();
        for file in files {
            if let Value::Mapping(entries) = self.load_file(&file)? {
                merged.extend(entries);
            }
        }
        debug!(dir = %dir.display(), keys = merged.len(), "Merged directory");
        Ok(Value::Mapping(merged))
    }
}

/// Path named by a tag, resolved against the directory of `origin`
fn relative_target(value: &Value, origin: &Path) -> ConfigResult<PathBuf> {
    let Value::String(target) = value else {
        return Err(ConfigError::BadInclude {
            target: format!("{value:?}"),
            reason: "expected a path".to_string(),
        });
    };

    Ok(match origin.parent() {
        Some(dir) => dir.join(target),
        None => PathBuf::from(target),
    })
}

/// `NAME` or `NAME default text`
fn env_var(value: &Value) -> ConfigResult<Value> {
    let Value::String(raw) = value else {
        return Err(ConfigError::InvalidValue {
            key: "!env_var".to_string(),
            reason: "expected a variable name".to_string(),
        });
    };

    let raw = raw.trim();
    let (name, default) = match raw.split_once(char::is_whitespace) {
        Some((name, default)) => (name, Some(default.trim())),
        None => (raw, None),
    };

    match (std::env::var(name), default) {
        (Ok(found), _) => Ok(Value::String(found)),
        (Err(_), Some(default)) => {
            debug!(var = name, "Variable unset, using default");
            Ok(Value::String(default.to_string()))
        }
        (Err(_), None) => Err(ConfigError::MissingEnvVar {
            var: name.to_string(),
        }),
    }
}

/// Read `file` from `config_dir` and expand its tags
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_file(file)
}

/// Expand an in-memory document as if it were `config_dir/source_name`
pub fn load_yaml_string(
    config_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir);
    let origin = loader.config_dir().join(source_name);
    loader.load_string(content, &origin)
}

/// Deserialize one top-level section of a loaded document
///
/// Returns `Ok(None)` when the section is absent or null.
pub fn section<T: DeserializeOwned>(config: &Value, key: &str) -> ConfigResult<Option<T>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_yaml::from_value(value.clone())
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}
