//! Error types for gocdpb-server.

use thiserror::Error;

use gocdpb_core::CruiseError;

use crate::transport::Method;

/// All errors that can arise while talking to the server or running
/// settings operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server answered with a status other than 200.
    #[error("{method} {path} failed with status {status}: {body}")]
    Remote {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// A response lacked a header the protocol requires.
    #[error("response to {path} is missing the '{header}' header")]
    MissingHeader { header: &'static str, path: String },

    /// A response body had an unexpected shape.
    #[error("unexpected response from {path}: {message}")]
    UnexpectedResponse { path: String, message: String },

    /// A response body was not valid JSON.
    #[error("invalid JSON from {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A mutating REST call happened after the last fetch; uploading now
    /// would send an out-of-date concurrency token.
    #[error("configuration changed on the server since it was fetched; fetch again before uploading")]
    StaleDocument,

    /// No configuration document has been fetched.
    #[error("no configuration document has been fetched")]
    NoDocument,

    /// Editing the configuration document failed.
    #[error(transparent)]
    Document(#[from] CruiseError),

    /// A `task` update without a dependency material, when the implicit one
    /// cannot be derived.
    #[error("explicit dependency material is needed unless there is exactly one stage in the new pipeline")]
    ExplicitDependencyRequired,

    /// The target of a group rename/move already holds pipelines.
    #[error("pipeline group \"{group}\" exists and contains pipelines: {}", .pipelines.join(", "))]
    GroupNotEmpty { group: String, pipelines: Vec<String> },

    /// A named stage or job does not exist in a pipeline config.
    #[error("{0}")]
    Lookup(String),

    /// An operation payload could not be interpreted.
    #[error("invalid '{key}' operation: {message}")]
    InvalidOperation { key: String, message: String },

    /// A plugin name that is not one of the built-ins.
    #[error("unknown plugin '{0}' (known: pipeline-groups, pipeline-admin, xml-pipelines)")]
    UnknownPlugin(String),
}

impl ServerError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// `true` for non-200 answers from the server.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}
