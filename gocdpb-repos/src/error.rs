use std::path::PathBuf;

use thiserror::Error;

use crate::consistency::Conflict;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("inconsistencies found in {label}:\n{}", describe_conflicts(.conflicts))]
    Inconsistent { label: String, conflicts: Vec<Conflict> },

    #[error("`{command}` failed{}: {output}", exit_suffix(.exit_code))]
    Git {
        command: String,
        output: String,
        exit_code: Option<i32>,
    },

    #[error("cannot parse repository description '{0}', expected 'URL: <url>, Branch: <branch>'")]
    Description(String),

    #[error("repository '{description}' has neither a revision nor a tag")]
    MissingRevision { description: String },

    #[error("refusing to pass '{value}' to git, it looks like an option")]
    OptionLike { value: String },

    #[error("no repository has been cloned yet")]
    NotCloned,

    #[error("invalid repository manifest {label}: {source}")]
    Json {
        label: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RepoError {
    RepoError::Io {
        path: path.into(),
        source,
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|code| format!(" (exit code {code})")).unwrap_or_default()
}

fn describe_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(Conflict::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
