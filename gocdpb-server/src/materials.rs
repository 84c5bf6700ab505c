//! Recursive source-material walk over a pipeline instance's build cause.
//!
//! Upstream pipeline materials are followed (their revision reads
//! `pipeline/counter/stage/run`); every other material is a source material
//! identified by `(type, description, revision)`. Each source material
//! collects the `(pipeline, counter)` builds that used it, including the
//! builds of every upstream pipeline on the way.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde_json::Value;
use tracing::debug;

use gocdpb_core::{PipelineRun, RepoEntry};

use crate::client::ConfigClient;
use crate::error::ServerError;

const PIPELINE_MATERIAL: &str = "Pipeline";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceMaterial {
    pub material_type: String,
    pub description: String,
    pub revision: String,
}

impl fmt::Display for SourceMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {}; {}", self.material_type, self.description, self.revision)
    }
}

/// Source materials and the builds that used them.
pub type MaterialUsage = BTreeMap<SourceMaterial, BTreeSet<PipelineRun>>;

/// Walk from `pipeline_instance` (`name/counter`, extra segments ignored).
pub fn collect_source_materials(
    client: &mut ConfigClient,
    pipeline_instance: &str,
) -> Result<MaterialUsage, ServerError> {
    let run = parse_instance(pipeline_instance)?;
    let mut seen = HashMap::new();
    walk(client, &run, &mut seen)
}

fn walk(
    client: &mut ConfigClient,
    run: &PipelineRun,
    seen: &mut HashMap<PipelineRun, MaterialUsage>,
) -> Result<MaterialUsage, ServerError> {
    if let Some(usage) = seen.get(run) {
        return Ok(usage.clone());
    }
    debug!(pipeline = %run.name, counter = %run.counter, "walking build cause");

    let path = format!("/api/pipelines/{}/instance/{}", run.name, run.counter);
    let instance = client.get_pipeline_instance(&run.name, &run.counter)?;
    let revisions = instance["build_cause"]["material_revisions"]
        .as_array()
        .ok_or_else(|| unexpected(&path, "missing build_cause.material_revisions"))?;

    let mut usage = MaterialUsage::new();
    for material_revision in revisions {
        let material = &material_revision["material"];
        let material_type = text(material, "type", &path)?;
        let revision = latest_revision(&material_revision["modifications"], &path)?;

        if material_type == PIPELINE_MATERIAL {
            let upstream = parse_instance(&revision)?;
            for (source, runs) in walk(client, &upstream, seen)? {
                usage.entry(source).or_default().extend(runs);
            }
        } else {
            let source = SourceMaterial {
                material_type,
                description: text(material, "description", &path)?,
                revision,
            };
            usage.entry(source).or_default().insert(run.clone());
        }
    }

    seen.insert(run.clone(), usage.clone());
    Ok(usage)
}

/// Revision of the modification with the greatest `modified_time`.
fn latest_revision(modifications: &Value, path: &str) -> Result<String, ServerError> {
    let latest = modifications
        .as_array()
        .and_then(|mods| {
            mods.iter().max_by(|a, b| {
                let a = a["modified_time"].as_f64().unwrap_or(f64::MIN);
                let b = b["modified_time"].as_f64().unwrap_or(f64::MIN);
                a.total_cmp(&b)
            })
        })
        .ok_or_else(|| unexpected(path, "material revision without modifications"))?;
    text(latest, "revision", path)
}

fn text(value: &Value, key: &str, path: &str) -> Result<String, ServerError> {
    value[key]
        .as_str()
        .map(String::from)
        .ok_or_else(|| unexpected(path, format!("missing '{key}'")))
}

fn unexpected(path: &str, message: impl Into<String>) -> ServerError {
    ServerError::UnexpectedResponse {
        path: path.to_string(),
        message: message.into(),
    }
}

fn parse_instance(text: &str) -> Result<PipelineRun, ServerError> {
    let mut parts = text.split('/');
    match (parts.next(), parts.next()) {
        (Some(name), Some(counter)) if !name.is_empty() && !counter.is_empty() => {
            Ok(PipelineRun::new(name, counter))
        }
        _ => Err(ServerError::Lookup(format!(
            "'{text}' is not of the form pipeline/instance"
        ))),
    }
}

/// Git-manifest records, sorted by material.
pub fn to_manifest(usage: &MaterialUsage) -> Vec<RepoEntry> {
    usage
        .iter()
        .map(|(source, runs)| RepoEntry {
            description: source.description.clone(),
            pipelines: runs.iter().cloned().collect(),
            revision: Some(source.revision.clone()),
            tag: None,
            material_type: source.material_type.clone(),
        })
        .collect()
}

/// `type; description; revision; p/c, p/c` per material.
pub fn to_semicolon_lines(usage: &MaterialUsage) -> Vec<String> {
    usage
        .iter()
        .map(|(source, runs)| {
            let runs: Vec<String> = runs.iter().map(PipelineRun::to_string).collect();
            format!("{source}; {}", runs.join(", "))
        })
        .collect()
}
