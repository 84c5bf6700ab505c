//! Error types for gocdpb-settings.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading and rendering settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Tera template engine error.
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// The rendered settings are not valid JSON.
    #[error("rendered settings are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The YAML settings file could not be parsed.
    #[error("failed to parse YAML settings at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Filesystem error reading a settings file or template.
    #[error("settings io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.into(),
        source,
    }
}
