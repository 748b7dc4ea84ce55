use thiserror::Error;
use vs_config::ConfigError;
use vs_script::{RegistryError, ScriptError};
use vs_storage::StorageError;

/// Skill errors
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("No script named {name}")]
    UnknownScript { name: String },
}

pub type SkillResult<T> = Result<T, SkillError>;
