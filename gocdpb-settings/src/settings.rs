//! Loading the ordered operations list.
//!
//! # Sources
//!
//! - JSON: the settings text is itself a template, rendered with
//!   `defaults ⊕ defines` and parsed as a JSON array of objects.
//! - YAML: `{path: <json template>, parameters: {...}}`; the template at
//!   `path` is rendered with `defaults ⊕ parameters ⊕ defines`.
//!
//! Object key order is preserved so operations see their keys in the order
//! they were written.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::defaults::DefaultParameterProvider;
use crate::engine::{layer, render_template};
use crate::error::{io_err, SettingsError};

/// One settings operation: a mapping from operation key to payload.
pub type Operation = Map<String, Value>;

/// YAML indirection file.
#[derive(Debug, Clone, Deserialize)]
pub struct YamlSettingsFile {
    pub path: PathBuf,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Rendered, parsed settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub operations: Vec<Operation>,
}

impl Settings {
    /// Render a JSON settings template.
    pub fn from_json_template(
        template: &str,
        defines: &Map<String, Value>,
        defaults: &dyn DefaultParameterProvider,
    ) -> Result<Self, SettingsError> {
        let parameters = layer(defaults.defaults()?, &[defines]);
        Self::render(template, &parameters)
    }

    /// Read a YAML indirection file and render the template it names.
    pub fn from_yaml_file(
        path: &Path,
        defines: &Map<String, Value>,
        defaults: &dyn DefaultParameterProvider,
    ) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let file: YamlSettingsFile =
            serde_yaml::from_str(&text).map_err(|source| SettingsError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        let template = std::fs::read_to_string(&file.path).map_err(|e| io_err(&file.path, e))?;
        let parameters = layer(defaults.defaults()?, &[&file.parameters, defines]);
        Self::render(&template, &parameters)
    }

    fn render(template: &str, parameters: &Map<String, Value>) -> Result<Self, SettingsError> {
        let rendered = render_template(template, parameters)?;
        debug!("rendered json settings:\n\n{rendered}\n");
        Self::parse(&rendered)
    }

    /// Parse already-rendered JSON settings.
    pub fn parse(json: &str) -> Result<Self, SettingsError> {
        Ok(Self {
            operations: serde_json::from_str(json)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Turn `key=value` defines into a parameter map.
pub fn defines_from_pairs<'a, I>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect()
}
