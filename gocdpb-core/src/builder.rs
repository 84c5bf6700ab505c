//! Declarative pipeline definitions and their translation into cruise-config
//! XML.
//!
//! A definition names the target group and describes one pipeline:
//!
//! ```yaml
//! pipelines:
//!   group: backend
//! pipeline:
//!   name: api
//!   environment: dev            # optional
//!   params: [{REPO: api}]       # optional
//!   environmentvariables: [{LANG: C}]
//!   materials:
//!     - git: {url: "https://example.com/api.git", branch: master}
//!   stages:                     # or `template: some-template`
//!     - stage:
//!         name: build
//!         jobs:
//!           - job:
//!               name: compile
//!               tasks:
//!                 - exec: {command: make, arg: [all]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cruise::{ConfigDocument, Element};
use crate::error::CruiseError;

// ---------------------------------------------------------------------------
// Definition types
// ---------------------------------------------------------------------------

/// A pipeline plus the group it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub pipelines: GroupRef,
    pub pipeline: PipelineSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmentvariables: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub materials: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<StageEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: StageSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    pub job: JobSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Map<String, Value>>,
}

impl PipelineDefinition {
    /// Interpret a settings value (parsed from JSON or YAML) as a definition.
    pub fn from_value(value: Value) -> Result<Self, CruiseError> {
        serde_json::from_value(value).map_err(|e| CruiseError::InvalidDefinition(e.to_string()))
    }

    pub fn group(&self) -> &str {
        &self.pipelines.group
    }

    pub fn name(&self) -> &str {
        &self.pipeline.name
    }

    /// Stage names in declaration order; empty for template pipelines.
    pub fn stage_names(&self) -> Vec<String> {
        self.pipeline
            .stages
            .iter()
            .flatten()
            .map(|entry| entry.stage.name.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// What happened to the environment reference of an inserted pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentPlacement {
    /// The definition names no environment.
    NotRequested,
    Assigned(String),
    AlreadyPresent(String),
    /// The named environment is not in the document; reported, not raised.
    Missing(String),
}

/// Build the pipeline described by `definition`, append it to its group
/// (creating the group when needed) and reference it from its environment.
pub fn insert_pipeline(
    document: &mut ConfigDocument,
    definition: &PipelineDefinition,
) -> Result<EnvironmentPlacement, CruiseError> {
    let element = PipelineBuilder::new(&definition.pipeline).build()?;
    document
        .ensure_pipeline_group(definition.group())
        .push_child(element);
    debug!(
        pipeline = %definition.name(),
        group = %definition.group(),
        "pipeline added to document"
    );

    let Some(environment) = definition.pipeline.environment.as_deref() else {
        return Ok(EnvironmentPlacement::NotRequested);
    };
    match document.assign_pipeline_to_environment(environment, definition.name()) {
        Ok(true) => Ok(EnvironmentPlacement::Assigned(environment.to_string())),
        Ok(false) => Ok(EnvironmentPlacement::AlreadyPresent(environment.to_string())),
        Err(CruiseError::EnvironmentNotFound { name }) => {
            warn!(environment = %name, pipeline = %definition.name(), "no such environment");
            Ok(EnvironmentPlacement::Missing(name))
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// PipelineBuilder
// ---------------------------------------------------------------------------

/// Translates one [`PipelineSpec`] into a `<pipeline>` element.
pub struct PipelineBuilder<'a> {
    spec: &'a PipelineSpec,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(spec: &'a PipelineSpec) -> Self {
        Self { spec }
    }

    /// Child order: params, environmentvariables, materials, stages. A
    /// template pipeline carries a `template` attribute instead of stages.
    pub fn build(&self) -> Result<Element, CruiseError> {
        let mut pipeline = Element::new("pipeline").with_attr("name", &self.spec.name);
        self.add_params(&mut pipeline)?;
        self.add_environment_variables(&mut pipeline)?;
        self.add_materials(&mut pipeline)?;

        match (&self.spec.template, &self.spec.stages) {
            (Some(_), Some(stages)) if !stages.is_empty() => {
                return Err(CruiseError::InvalidDefinition(format!(
                    "pipeline '{}' has both a template and stages",
                    self.spec.name
                )));
            }
            (Some(template), _) => pipeline.set_attr("template", template),
            (None, Some(stages)) => {
                for entry in stages {
                    pipeline.push_child(build_stage(&entry.stage)?);
                }
            }
            (None, None) => {
                return Err(CruiseError::InvalidDefinition(format!(
                    "pipeline '{}' needs either a template or stages",
                    self.spec.name
                )));
            }
        }
        Ok(pipeline)
    }

    fn add_params(&self, pipeline: &mut Element) -> Result<(), CruiseError> {
        let Some(params) = &self.spec.params else {
            return Ok(());
        };
        let section = pipeline.sub_element("params");
        for param in params {
            for (key, value) in param {
                section.push_child(
                    Element::new("param")
                        .with_attr("name", key)
                        .with_text(scalar(value, key)?),
                );
            }
        }
        Ok(())
    }

    fn add_environment_variables(&self, pipeline: &mut Element) -> Result<(), CruiseError> {
        let Some(variables) = &self.spec.environmentvariables else {
            return Ok(());
        };
        let section = pipeline.sub_element("environmentvariables");
        for variable in variables {
            for (key, value) in variable {
                let element = section.push_child(Element::new("variable").with_attr("name", key));
                element.push_child(Element::new("value").with_text(scalar(value, key)?));
            }
        }
        Ok(())
    }

    fn add_materials(&self, pipeline: &mut Element) -> Result<(), CruiseError> {
        if self.spec.materials.is_empty() {
            return Err(CruiseError::InvalidDefinition(format!(
                "pipeline '{}' has no materials",
                self.spec.name
            )));
        }
        let section = pipeline.sub_element("materials");
        for material in &self.spec.materials {
            for (kind, content) in material {
                match kind.as_str() {
                    "git" => {
                        section.push_child(attributes_element("git", content)?);
                    }
                    other => {
                        return Err(CruiseError::UnknownMaterial {
                            kind: other.to_string(),
                        })
                    }
                }
            }
        }
        Ok(())
    }
}

fn build_stage(stage: &StageSpec) -> Result<Element, CruiseError> {
    let mut element = Element::new("stage").with_attr("name", &stage.name);
    let jobs = element.sub_element("jobs");
    for entry in &stage.jobs {
        let job = jobs.push_child(Element::new("job").with_attr("name", &entry.job.name));
        let tasks = job.sub_element("tasks");
        for task in &entry.job.tasks {
            for (kind, content) in task {
                match kind.as_str() {
                    "exec" => {
                        tasks.push_child(build_exec(content)?);
                    }
                    other => {
                        return Err(CruiseError::UnknownTask {
                            kind: other.to_string(),
                        })
                    }
                }
            }
        }
    }
    Ok(element)
}

/// `arg` entries become repeated `<arg>` children; every other key is an
/// attribute.
fn build_exec(content: &Value) -> Result<Element, CruiseError> {
    let fields = as_object(content, "exec")?;
    let mut exec = Element::new("exec");
    for (key, value) in fields {
        if key == "arg" {
            let args = value.as_array().ok_or_else(|| {
                CruiseError::InvalidDefinition("exec 'arg' must be a list".to_string())
            })?;
            for arg in args {
                exec.push_child(Element::new("arg").with_text(scalar(arg, "arg")?));
            }
        } else {
            exec.set_attr(key, scalar(value, key)?);
        }
    }
    Ok(exec)
}

fn attributes_element(tag: &str, content: &Value) -> Result<Element, CruiseError> {
    let mut element = Element::new(tag);
    for (key, value) in as_object(content, tag)? {
        element.set_attr(key, scalar(value, key)?);
    }
    Ok(element)
}

fn as_object<'v>(value: &'v Value, what: &str) -> Result<&'v Map<String, Value>, CruiseError> {
    value
        .as_object()
        .ok_or_else(|| CruiseError::InvalidDefinition(format!("'{what}' must be a mapping")))
}

/// Strings verbatim; numbers and booleans in their JSON spelling.
fn scalar(value: &Value, key: &str) -> Result<String, CruiseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(CruiseError::InvalidDefinition(format!(
            "value of '{key}' must be a scalar"
        ))),
    }
}
