//! Executes the ordered settings operations against a [`ConfigClient`].
//!
//! # Per-operation order
//!
//! 1. registered plugin handlers whose key is present
//! 2. `create-a-pipeline`
//! 3. `environment`, once any pipeline has been created: re-fetch, assign
//!    every created pipeline, upload if changed
//! 4. `add-downstream-dependencies`
//! 5. for every created pipeline: `unpause`, then status when verbose
//!
//! Environment assignment must see the freshly created pipelines, and
//! dependencies must be wired before a pipeline is unpaused.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use gocdpb_core::CruiseError;

use crate::client::ConfigClient;
use crate::error::ServerError;
use crate::observer::CreatedPipelines;
use crate::plugins::plugin_handlers;

/// Handler for one operation key; receives the value stored under that key.
pub type ActionHandler = Box<dyn Fn(&mut ConfigClient, &Value) -> Result<(), ServerError>>;

/// Operation keys the runner handles itself.
pub const CREATE_A_PIPELINE: &str = "create-a-pipeline";
pub const ENVIRONMENT: &str = "environment";
pub const ADD_DOWNSTREAM_DEPENDENCIES: &str = "add-downstream-dependencies";
pub const UNPAUSE: &str = "unpause";

// ---------------------------------------------------------------------------
// ActionRegistry
// ---------------------------------------------------------------------------

/// Operation keys mapped to handlers, in registration order.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: Vec<(String, ActionHandler)>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the handlers of each named built-in plugin.
    pub fn with_plugins<'a, I>(names: I) -> Result<Self, ServerError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register_plugin(name)?;
        }
        Ok(registry)
    }

    pub fn register_plugin(&mut self, name: &str) -> Result<(), ServerError> {
        for (key, handler) in plugin_handlers(name)? {
            self.register(key, handler);
        }
        debug!(plugin = %name, "plugin registered");
        Ok(())
    }

    /// Register `handler` for `key`. Re-registering a key replaces the
    /// handler but keeps the key's original position.
    pub fn register(&mut self, key: impl Into<String>, handler: ActionHandler) {
        let key = key.into();
        match self.handlers.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = handler,
            None => self.handlers.push((key, handler)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(key, _)| key.as_str())
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &ActionHandler)> {
        self.handlers.iter().map(|(key, handler)| (key.as_str(), handler))
    }
}

// ---------------------------------------------------------------------------
// OperationRunner
// ---------------------------------------------------------------------------

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Pipelines created during the run, in creation order.
    pub created: Vec<String>,
}

type StatusSink<'a> = Box<dyn FnMut(&str, &Value) + 'a>;

pub struct OperationRunner<'a> {
    registry: &'a ActionRegistry,
    verbose: bool,
    on_status: Option<StatusSink<'a>>,
}

impl<'a> OperationRunner<'a> {
    pub fn new(registry: &'a ActionRegistry) -> Self {
        Self {
            registry,
            verbose: false,
            on_status: None,
        }
    }

    /// Fetch each created pipeline's status after every operation.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Where verbose status reports go.
    pub fn on_status(mut self, sink: impl FnMut(&str, &Value) + 'a) -> Self {
        self.on_status = Some(Box::new(sink));
        self
    }

    pub fn run(
        &mut self,
        client: &mut ConfigClient,
        operations: &[Map<String, Value>],
    ) -> Result<RunReport, ServerError> {
        let created = Rc::new(RefCell::new(CreatedPipelines::default()));
        let observer = client.add_observer(Box::new(Rc::clone(&created)));
        let outcome = self.run_operations(client, operations, &created);
        client.remove_observer(observer);
        outcome?;

        let report = RunReport {
            created: created.borrow().names(),
        };
        Ok(report)
    }

    fn run_operations(
        &mut self,
        client: &mut ConfigClient,
        operations: &[Map<String, Value>],
        created: &RefCell<CreatedPipelines>,
    ) -> Result<(), ServerError> {
        for (index, operation) in operations.iter().enumerate() {
            debug!(index, keys = ?operation.keys().collect::<Vec<_>>(), "operation");

            for (key, handler) in self.registry.iter() {
                if let Some(payload) = operation.get(key) {
                    handler(client, payload)?;
                }
            }

            if let Some(payload) = operation.get(CREATE_A_PIPELINE) {
                let pipeline = client.create_pipeline(payload)?;
                info!(pipeline = %pipeline.name, "pipeline created");
            }

            if !created.borrow().is_empty() {
                if let Some(environment) = operation.get(ENVIRONMENT) {
                    let names = created.borrow().names();
                    assign_environment(client, environment, &names)?;
                }
            }

            if let Some(updates) = operation.get(ADD_DOWNSTREAM_DEPENDENCIES) {
                let updates = updates.as_array().ok_or_else(|| {
                    ServerError::invalid(ADD_DOWNSTREAM_DEPENDENCIES, "expected a list")
                })?;
                for update in updates {
                    add_downstream_dependency(client, update, &created.borrow())?;
                }
            }

            let unpause = operation.get(UNPAUSE).is_some_and(is_truthy);
            let names = created.borrow().names();
            for name in &names {
                if unpause {
                    client.unpause(name)?;
                    info!(pipeline = %name, "unpaused");
                }
                if self.verbose {
                    let status = client.get_pipeline_status(name)?;
                    if let Some(sink) = self.on_status.as_mut() {
                        sink(name, &status);
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Reference every created pipeline from `environment` in a freshly fetched
/// document and upload if that changed anything.
fn assign_environment(
    client: &mut ConfigClient,
    environment: &Value,
    pipelines: &[String],
) -> Result<(), ServerError> {
    let Some(environment) = environment.as_str().filter(|name| !name.is_empty()) else {
        return Ok(());
    };

    client.invalidate();
    client.fetch()?;
    let document = client.document_mut()?;
    for pipeline in pipelines {
        match document.assign_pipeline_to_environment(environment, pipeline) {
            Ok(true) => debug!(%pipeline, %environment, "assigned to environment"),
            Ok(false) => debug!(%pipeline, %environment, "already in environment"),
            Err(CruiseError::EnvironmentNotFound { name }) => {
                warn!(environment = %name, "no such environment in configuration");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if client.needs_upload() {
        client.upload_full_document()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Downstream dependencies
// ---------------------------------------------------------------------------

fn add_downstream_dependency(
    client: &mut ConfigClient,
    update: &Value,
    created: &CreatedPipelines,
) -> Result<(), ServerError> {
    let name = update["name"].as_str().ok_or_else(|| {
        ServerError::invalid(ADD_DOWNSTREAM_DEPENDENCIES, "update without a pipeline name")
    })?;
    let (etag, mut pipeline) = client.get_pipeline_config(name)?;
    apply_dependency_update(&mut pipeline, update, created)?;
    client.edit_pipeline_config(name, &etag, &pipeline)?;
    info!(pipeline = %name, "downstream dependency added");
    Ok(())
}

/// Apply one update (`material` and/or `task`) to an editable pipeline config.
pub fn apply_dependency_update(
    pipeline: &mut Value,
    update: &Value,
    created: &CreatedPipelines,
) -> Result<(), ServerError> {
    if let Some(material) = update.get("material") {
        materials_mut(pipeline)?.push(material.clone());
    }
    if let Some(task) = update.get("task") {
        ensure_dependency_material(pipeline, created)?;
        if pipeline["stages"].is_array() {
            let job = get_job(pipeline, update)?;
            let tasks = job
                .get_mut("tasks")
                .and_then(Value::as_array_mut)
                .ok_or_else(|| ServerError::Lookup("job has no task list".to_string()))?;
            tasks.insert(0, task.clone());
        } else {
            warn!("adding tasks to a template is not supported");
        }
    }
    Ok(())
}

/// Add a dependency on the last created pipeline unless the config already
/// has a dependency material naming a pipeline.
pub fn ensure_dependency_material(
    pipeline: &mut Value,
    created: &CreatedPipelines,
) -> Result<(), ServerError> {
    let materials = materials_mut(pipeline)?;
    let has_dependency = materials.iter().any(|material| {
        material["type"] == "dependency"
            && material["attributes"]["pipeline"]
                .as_str()
                .is_some_and(|p| !p.is_empty())
    });
    if has_dependency {
        return Ok(());
    }

    match created.last() {
        Some(last) if last.stages.len() == 1 => {
            materials.push(json!({
                "type": "dependency",
                "attributes": {
                    "pipeline": last.name,
                    "stage": last.stages[0],
                    "auto_update": true
                }
            }));
            Ok(())
        }
        _ => Err(ServerError::ExplicitDependencyRequired),
    }
}

/// The job named by the update's `stage`/`job`, or the first of each.
pub fn get_job<'p>(pipeline: &'p mut Value, update: &Value) -> Result<&'p mut Value, ServerError> {
    let stages = pipeline
        .get_mut("stages")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ServerError::Lookup("pipeline has no stages".to_string()))?;
    let stage = select_named(stages, update["stage"].as_str(), "stage")?;
    let jobs = stage
        .get_mut("jobs")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ServerError::Lookup("stage has no jobs".to_string()))?;
    select_named(jobs, update["job"].as_str(), "job")
}

fn select_named<'v>(
    items: &'v mut [Value],
    name: Option<&str>,
    kind: &str,
) -> Result<&'v mut Value, ServerError> {
    match name {
        Some(name) => items
            .iter_mut()
            .find(|item| item["name"].as_str() == Some(name))
            .ok_or_else(|| ServerError::Lookup(format!("{kind} '{name}' not found"))),
        None => items
            .first_mut()
            .ok_or_else(|| ServerError::Lookup(format!("no {kind} to update"))),
    }
}

fn materials_mut(pipeline: &mut Value) -> Result<&mut Vec<Value>, ServerError> {
    pipeline
        .get_mut("materials")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ServerError::Lookup("pipeline config has no materials".to_string()))
}
