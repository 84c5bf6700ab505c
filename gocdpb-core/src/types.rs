//! Shared domain types: concurrency tokens and the Git-manifest records.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque value the server hands out with a document and requires back,
/// unchanged, on the next write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConcurrencyToken(pub String);

impl ConcurrencyToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConcurrencyToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Material type of Git repositories in the manifest.
pub const GIT_MATERIAL: &str = "Git";

/// One repository as used by one or more pipeline builds.
///
/// Fields are declared in alphabetical order so serialised manifests have
/// sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    /// Repository identity, e.g. `URL: https://host/repo.git, Branch: master`.
    pub description: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineRun>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(rename = "type")]
    pub material_type: String,
}

impl RepoEntry {
    /// The revision if set, otherwise the tag.
    pub fn revision_or_tag(&self) -> Option<&str> {
        self.revision
            .as_deref()
            .filter(|revision| !revision.is_empty())
            .or(self.tag.as_deref())
    }

    pub fn is_git(&self) -> bool {
        self.material_type == GIT_MATERIAL
    }
}

/// A `(pipeline, counter)` build that used a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineRun {
    #[serde(deserialize_with = "counter_from_string_or_number")]
    pub counter: String,
    pub name: String,
}

impl PipelineRun {
    pub fn new(name: impl Into<String>, counter: impl Into<String>) -> Self {
        Self {
            counter: counter.into(),
            name: name.into(),
        }
    }
}

/// Ordered by pipeline name, then counter.
impl Ord for PipelineRun {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.name, &self.counter).cmp(&(&other.name, &other.counter))
    }
}

impl PartialOrd for PipelineRun {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PipelineRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.counter)
    }
}

fn counter_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Counter {
        Text(String),
        Number(u64),
    }

    Ok(match Counter::deserialize(deserializer)? {
        Counter::Text(text) => text,
        Counter::Number(number) => number.to_string(),
    })
}
