//! Script definition
//!
//! A script is a named set of trigger phrases plus the command spoken when one
//! of them is heard.

use crate::action::Action;
use crate::parser::parse;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Trigger phrases as a list, or as one `;`-separated string
fn triggers_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) => Ok(s.split(';').map(str::to_string).collect()),
        StringOrVec::Vec(v) => Ok(v),
    }
}

/// Where a script came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOrigin {
    /// Loaded from the configuration document, replaced on every reload
    Declarative,

    /// Created by voice, persisted in storage
    Interactive,
}

/// Script configuration from YAML or storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Phrases that start the script
    #[serde(alias = "phrases", deserialize_with = "triggers_list")]
    pub triggers: Vec<String>,

    /// Raw command in the action language
    #[serde(alias = "commands")]
    pub command: String,
}

impl ScriptConfig {
    pub fn new(triggers: Vec<String>, command: impl Into<String>) -> Self {
        Self {
            triggers,
            command: command.into(),
        }
    }

    /// Trimmed triggers with blanks removed
    pub fn normalized_triggers(&self) -> Vec<String> {
        self.triggers
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// The declarative document: script name to definition, in document order
pub type DeclarativeScripts = IndexMap<String, ScriptConfig>;

/// Invalid script definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("Script name is empty")]
    EmptyName,

    #[error("Script {name} has no trigger phrases")]
    NoTriggers { name: String },
}

/// A loaded script
#[derive(Debug, Clone)]
pub struct ScriptEntity {
    /// Unique, case-sensitive name
    pub name: String,

    /// Normalized trigger phrases, never empty
    pub triggers: Vec<String>,

    /// Raw command the actions were parsed from
    pub command: String,

    /// Parsed actions, never empty
    pub actions: Arc<[Action]>,

    pub origin: ScriptOrigin,
}

impl ScriptEntity {
    /// Validate a definition and parse its command
    pub fn new(
        name: impl Into<String>,
        config: &ScriptConfig,
        origin: ScriptOrigin,
    ) -> Result<Self, ScriptError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ScriptError::EmptyName);
        }

        let triggers = config.normalized_triggers();
        if triggers.is_empty() {
            return Err(ScriptError::NoTriggers { name });
        }

        Ok(Self {
            name,
            triggers,
            actions: parse(&config.command).into(),
            command: config.command.clone(),
            origin,
        })
    }

    /// Whether `config` describes this same script
    pub fn same_definition(&self, config: &ScriptConfig) -> bool {
        self.command == config.command && self.triggers == config.normalized_triggers()
    }

    /// The definition, as it would be stored
    pub fn config(&self) -> ScriptConfig {
        ScriptConfig::new(self.triggers.clone(), self.command.clone())
    }

    pub fn is_interactive(&self) -> bool {
        self.origin == ScriptOrigin::Interactive
    }
}
