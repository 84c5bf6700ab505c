//! Built-in action plugins.
//!
//! A plugin is a named bundle of `(operation key, handler)` pairs. Plugins
//! are chosen by name on the command line and registered in order.
//!
//! | Plugin            | Keys                                             |
//! |-------------------|--------------------------------------------------|
//! | `pipeline-groups` | `rename-pipeline-group`, `move-pipeline-group`   |
//! | `pipeline-admin`  | `delete-a-pipeline`, `patch-environment`         |
//! | `xml-pipelines`   | `add-pipeline-xml`                               |

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use gocdpb_core::{EnvironmentPlacement, PipelineDefinition};

use crate::api::EnvironmentPatch;
use crate::client::ConfigClient;
use crate::error::ServerError;
use crate::runner::ActionHandler;

pub const PLUGIN_NAMES: [&str; 3] = ["pipeline-groups", "pipeline-admin", "xml-pipelines"];

/// Handlers contributed by the plugin called `name`.
pub fn plugin_handlers(name: &str) -> Result<Vec<(&'static str, ActionHandler)>, ServerError> {
    let handlers: Vec<(&'static str, ActionHandler)> = match name {
        "pipeline-groups" => vec![
            ("rename-pipeline-group", Box::new(rename_pipeline_group) as ActionHandler),
            ("move-pipeline-group", Box::new(move_pipeline_group) as ActionHandler),
        ],
        "pipeline-admin" => vec![
            ("delete-a-pipeline", Box::new(delete_pipeline) as ActionHandler),
            ("patch-environment", Box::new(patch_environment) as ActionHandler),
        ],
        "xml-pipelines" => vec![("add-pipeline-xml", Box::new(add_pipeline_xml) as ActionHandler)],
        other => return Err(ServerError::UnknownPlugin(other.to_string())),
    };
    Ok(handlers)
}

#[derive(Debug, Deserialize)]
struct GroupMove {
    source: String,
    target: String,
}

#[derive(Debug, Deserialize)]
struct EnvironmentPatchOperation {
    name: String,
    #[serde(flatten)]
    patch: EnvironmentPatch,
}

fn payload<T: for<'de> Deserialize<'de>>(key: &str, value: &Value) -> Result<T, ServerError> {
    serde_json::from_value(value.clone()).map_err(|e| ServerError::invalid(key, e.to_string()))
}

fn rename_pipeline_group(client: &mut ConfigClient, value: &Value) -> Result<(), ServerError> {
    let GroupMove { source, target } = payload("rename-pipeline-group", value)?;
    client.rename_pipeline_group(&source, &target)
}

fn move_pipeline_group(client: &mut ConfigClient, value: &Value) -> Result<(), ServerError> {
    let GroupMove { source, target } = payload("move-pipeline-group", value)?;
    client.move_all_pipelines_in_group(&source, &target)
}

fn delete_pipeline(client: &mut ConfigClient, value: &Value) -> Result<(), ServerError> {
    let name = value
        .as_str()
        .ok_or_else(|| ServerError::invalid("delete-a-pipeline", "expected a pipeline name"))?;
    client.delete_pipeline_config(name)?;
    info!(pipeline = %name, "pipeline deleted");
    Ok(())
}

fn patch_environment(client: &mut ConfigClient, value: &Value) -> Result<(), ServerError> {
    let operation: EnvironmentPatchOperation = payload("patch-environment", value)?;
    client.patch_environment(&operation.name, &operation.patch)
}

fn add_pipeline_xml(client: &mut ConfigClient, value: &Value) -> Result<(), ServerError> {
    let definition = PipelineDefinition::from_value(value.clone())?;
    if let EnvironmentPlacement::Assigned(environment) = client.insert_pipeline(&definition)? {
        info!(pipeline = %definition.name(), %environment, "pipeline added to environment");
    }
    Ok(())
}
