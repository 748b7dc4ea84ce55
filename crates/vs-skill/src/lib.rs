//! Voice scripts skill
//!
//! Glue between the script engine and the outside world:
//!
//! - [`ScriptingSkill`] - create, delete, list, describe and run scripts; bus event loop
//! - [`BusTriggerRegistrar`] - registers trigger phrases with the intent parser
//! - [`YamlScriptSource`] - the `scripts:` section of `configuration.yaml`
//! - [`ScriptStore`] - persistence of interactively created scripts

mod error;
mod registrar;
mod skill;
mod source;
mod store;

pub use error::{SkillError, SkillResult};
pub use registrar::BusTriggerRegistrar;
pub use skill::{runner_config, ScriptDescription, ScriptingSkill, SCRIPT_ENTITY};
pub use source::{DeclarativeSource, StaticSource, YamlScriptSource, SCRIPTS_SECTION};
pub use store::{InteractiveScripts, ScriptStore};
