//! # gocdpb-settings
//!
//! Turns a settings template (JSON, or YAML pointing at a JSON template) into
//! the ordered list of operations the server runner executes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gocdpb_settings::{GitCheckoutDefaults, Settings};
//! use serde_json::Map;
//!
//! fn load(template: &str) -> Result<Settings, gocdpb_settings::SettingsError> {
//!     let defaults = GitCheckoutDefaults::new(".");
//!     Settings::from_json_template(template, &Map::new(), &defaults)
//! }
//! ```

pub mod defaults;
pub mod engine;
pub mod error;
pub mod settings;

pub use defaults::{DefaultParameterProvider, GitCheckoutDefaults};
pub use engine::render_template;
pub use error::SettingsError;
pub use settings::{defines_from_pairs, Operation, Settings, YamlSettingsFile};
