//! Default template parameters.
//!
//! Settings templates may refer to `repo_name` and `repo_url` without the
//! operator defining them. The values come from a [`DefaultParameterProvider`];
//! the CLI uses [`GitCheckoutDefaults`] on the current directory.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{io_err, SettingsError};

/// Source of the lowest-precedence template parameters.
pub trait DefaultParameterProvider {
    fn defaults(&self) -> Result<Map<String, Value>, SettingsError>;
}

/// A fixed parameter map.
impl DefaultParameterProvider for Map<String, Value> {
    fn defaults(&self) -> Result<Map<String, Value>, SettingsError> {
        Ok(self.clone())
    }
}

/// Derives defaults from a Git working copy:
/// - `repo_name`: basename of `root`
/// - `repo_url`: the last `url = …` line of `<root>/.git/config`, if any
#[derive(Debug, Clone)]
pub struct GitCheckoutDefaults {
    root: PathBuf,
}

impl GitCheckoutDefaults {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DefaultParameterProvider for GitCheckoutDefaults {
    fn defaults(&self) -> Result<Map<String, Value>, SettingsError> {
        let mut data = Map::new();

        let git_config = self.root.join(".git").join("config");
        if git_config.is_file() {
            let text = std::fs::read_to_string(&git_config).map_err(|e| io_err(&git_config, e))?;
            if let Some(url) = last_remote_url(&text) {
                data.insert("repo_url".to_string(), Value::String(url.to_string()));
            }
        }

        let name = self
            .root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        data.insert("repo_name".to_string(), Value::String(name));

        debug!(root = %self.root.display(), ?data, "default settings parameters");
        Ok(data)
    }
}

fn last_remote_url(git_config: &str) -> Option<&str> {
    git_config
        .lines()
        .filter_map(|line| line.trim().strip_prefix("url = "))
        .map(str::trim)
        .last()
}
