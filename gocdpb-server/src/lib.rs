//! # gocdpb-server
//!
//! Client side of the server conversation: the cruise-config mirror with its
//! fetch/upload protocol ([`ConfigClient`]), the REST endpoints, pipeline
//! group administration, the settings [`OperationRunner`] with its plugin
//! [`ActionRegistry`], and the recursive build-material walk.

pub mod api;
pub mod client;
pub mod error;
pub mod groups;
pub mod materials;
pub mod observer;
pub mod plugins;
pub mod runner;
pub mod transport;

pub use api::{EnvironmentPatch, MembershipChange, PipelineGroupSummary};
pub use client::ConfigClient;
pub use error::ServerError;
pub use materials::{collect_source_materials, MaterialUsage, SourceMaterial};
pub use observer::{CreatedPipeline, CreatedPipelines, ObserverId, PipelineObserver};
pub use plugins::PLUGIN_NAMES;
pub use runner::{ActionHandler, ActionRegistry, OperationRunner, RunReport};
pub use transport::{HttpRequest, HttpResponse, Method, RequestBody, Transport, UreqTransport};
