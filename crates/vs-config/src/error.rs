use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid YAML: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("bad include target {target}: {reason}")]
    BadInclude { target: String, reason: String },

    #[error("included directory {} does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("{} includes itself", path.display())]
    IncludeCycle { path: PathBuf },

    #[error("environment variable {var} is not set and has no default")]
    MissingEnvVar { var: String },

    /// A value or section has the wrong shape
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
