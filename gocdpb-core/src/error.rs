//! Error types for gocdpb-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or editing a cruise-config document.
#[derive(Debug, Error)]
pub enum CruiseError {
    /// The XML text could not be parsed into a single-rooted element tree.
    #[error("malformed cruise-config XML: {0}")]
    Xml(String),

    /// No `pipelines` section carries the requested `group` attribute.
    #[error("pipeline group '{name}' not found")]
    GroupNotFound { name: String },

    /// No `environment` element carries the requested `name` attribute.
    #[error("environment '{name}' not found")]
    EnvironmentNotFound { name: String },

    /// A material kind PipelineBuilder does not know how to express.
    #[error("unknown material: {kind}")]
    UnknownMaterial { kind: String },

    /// A task kind PipelineBuilder does not know how to express.
    #[error("unknown task type: {kind}")]
    UnknownTask { kind: String },

    /// A pipeline definition that cannot be turned into XML.
    #[error("invalid pipeline definition: {0}")]
    InvalidDefinition(String),
}

/// Errors raised while loading or validating the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the configuration file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`ServerConfig`](crate::config::ServerConfig).
    #[error("failed to parse server configuration at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Same as [`ConfigError::Yaml`] for in-memory text.
    #[error("failed to parse server configuration: {0}")]
    YamlText(#[from] serde_yaml::Error),

    /// `url` is required.
    #[error("missing 'url' in configuration")]
    MissingUrl,

    /// Only one half of the credential pair was supplied.
    #[error("need both or neither of ('username', 'password') in configuration")]
    PartialCredentials,

    /// An override named a key the configuration does not have.
    #[error("unknown configuration parameter '{0}'")]
    UnknownKey(String),

    /// An override value could not be converted to the field's type.
    #[error("invalid value '{value}' for configuration parameter '{key}'")]
    InvalidValue { key: String, value: String },
}
