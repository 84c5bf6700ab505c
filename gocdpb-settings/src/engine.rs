//! Tera rendering of settings templates.

use serde_json::{Map, Value};
use tera::{Context, Tera};

use crate::error::SettingsError;

/// Render `template` with `parameters`. Autoescaping is off: the output is
/// JSON, not HTML.
pub fn render_template(template: &str, parameters: &Map<String, Value>) -> Result<String, SettingsError> {
    let context = Context::from_serialize(parameters)?;
    Ok(Tera::one_off(template, &context, false)?)
}

/// `base`, then each layer in turn; later keys win.
pub fn layer(base: Map<String, Value>, layers: &[&Map<String, Value>]) -> Map<String, Value> {
    let mut merged = base;
    for layer in layers {
        for (key, value) in layer.iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
