//! gocdpb core library: cruise-config document model, pipeline builder,
//! server configuration and Git-manifest types.
//!
//! - [`cruise`]: [`ConfigDocument`] and its structural edits
//! - [`builder`]: [`PipelineBuilder`] and pipeline definitions
//! - [`config`]: [`ServerConfig`] / [`ServerSettings`]
//! - [`types`]: concurrency token and manifest records
//! - [`error`]: [`CruiseError`], [`ConfigError`]

pub mod builder;
pub mod config;
pub mod cruise;
pub mod error;
pub mod types;

pub use builder::{insert_pipeline, EnvironmentPlacement, PipelineBuilder, PipelineDefinition};
pub use config::{Credentials, ServerConfig, ServerSettings};
pub use cruise::{ConfigDocument, Element, TEST_SECTIONS};
pub use error::{ConfigError, CruiseError};
pub use types::{ConcurrencyToken, PipelineRun, RepoEntry, GIT_MATERIAL};
