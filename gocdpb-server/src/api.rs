//! REST endpoints of the server.
//!
//! Each endpoint pins its `Accept` version; the server's behaviour differs
//! between API versions.
//!
//! | Endpoint                                   | Accept                          |
//! |--------------------------------------------|---------------------------------|
//! | `POST/GET/PUT/DELETE /api/admin/pipelines` | `application/vnd.go.cd.v5+json` |
//! | `POST /api/pipelines/{name}/unpause`       | `application/vnd.go.cd.v1+json` |
//! | `PATCH /api/admin/environments/{name}`     | `application/vnd.go.cd.v2+json` |
//! | status, pipeline groups, instance          | `application/json`              |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{parse_json, ConfigClient};
use crate::error::ServerError;
use crate::observer::CreatedPipeline;
use crate::transport::{Method, RequestBody};

const PIPELINE_ADMIN: &str = "application/vnd.go.cd.v5+json";
const UNPAUSE: &str = "application/vnd.go.cd.v1+json";
const ENVIRONMENT_ADMIN: &str = "application/vnd.go.cd.v2+json";
const PLAIN_JSON: &str = "application/json";

/// Entry of `GET /api/config/pipeline_groups`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineGroupSummary {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<NamedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedItem {
    pub name: String,
}

/// Additions and removals for one membership list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Body of `PATCH /api/admin/environments/{name}`. Empty lists are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentPatch {
    #[serde(default, skip_serializing_if = "MembershipChange::is_empty")]
    pub pipelines: MembershipChange,
    #[serde(default, skip_serializing_if = "MembershipChange::is_empty")]
    pub agents: MembershipChange,
}

impl ConfigClient {
    /// `POST /api/admin/pipelines` with a create-a-pipeline payload
    /// (`{"group": …, "pipeline": {"name": …, "stages": [...]}}`).
    pub fn create_pipeline(&mut self, payload: &Value) -> Result<CreatedPipeline, ServerError> {
        let created = created_from_payload(payload)?;
        self.request_ok(
            Method::Post,
            "/api/admin/pipelines",
            &[("Accept", PIPELINE_ADMIN), ("Content-Type", PLAIN_JSON)],
            RequestBody::Json(payload.to_string()),
        )?;
        self.notify_created(&created);
        Ok(created)
    }

    /// Returns the ETag to pass to [`ConfigClient::edit_pipeline_config`]
    /// together with the editable config.
    pub fn get_pipeline_config(&mut self, name: &str) -> Result<(String, Value), ServerError> {
        let path = format!("/api/admin/pipelines/{name}");
        let response = self.request_ok(
            Method::Get,
            &path,
            &[("Accept", PIPELINE_ADMIN)],
            RequestBody::Empty,
        )?;
        let etag = response
            .header("ETag")
            .ok_or_else(|| ServerError::MissingHeader {
                header: "ETag",
                path: path.clone(),
            })?
            .to_string();
        Ok((etag, parse_json(&path, &response.body)?))
    }

    /// Conditional update; the server rejects a stale `etag`.
    pub fn edit_pipeline_config(
        &mut self,
        name: &str,
        etag: &str,
        pipeline: &Value,
    ) -> Result<(), ServerError> {
        self.request_ok(
            Method::Put,
            &format!("/api/admin/pipelines/{name}"),
            &[
                ("Accept", PIPELINE_ADMIN),
                ("Content-Type", PLAIN_JSON),
                ("If-Match", etag),
            ],
            RequestBody::Json(pipeline.to_string()),
        )?;
        Ok(())
    }

    pub fn delete_pipeline_config(&mut self, name: &str) -> Result<(), ServerError> {
        self.request_ok(
            Method::Delete,
            &format!("/api/admin/pipelines/{name}"),
            &[("Accept", PIPELINE_ADMIN)],
            RequestBody::Empty,
        )?;
        Ok(())
    }

    /// A refused unpause (e.g. the pipeline is not paused) is logged by
    /// [`ConfigClient::request`] and otherwise ignored.
    pub fn unpause(&mut self, name: &str) -> Result<(), ServerError> {
        self.request(
            Method::Post,
            &format!("/api/pipelines/{name}/unpause"),
            &[("Accept", UNPAUSE), ("X-GoCD-Confirm", "true")],
            RequestBody::Empty,
        )?;
        Ok(())
    }

    pub fn get_pipeline_status(&mut self, name: &str) -> Result<Value, ServerError> {
        self.get_json(&format!("/api/pipelines/{name}/status"))
    }

    pub fn get_pipeline_groups(&mut self) -> Result<Vec<PipelineGroupSummary>, ServerError> {
        let path = "/api/config/pipeline_groups";
        let value = self.get_json(path)?;
        serde_json::from_value(value).map_err(|source| ServerError::Json {
            path: path.to_string(),
            source,
        })
    }

    pub fn get_pipeline_instance(&mut self, pipeline: &str, instance: &str) -> Result<Value, ServerError> {
        self.get_json(&format!("/api/pipelines/{pipeline}/instance/{instance}"))
    }

    pub fn patch_environment(&mut self, name: &str, patch: &EnvironmentPatch) -> Result<(), ServerError> {
        let path = format!("/api/admin/environments/{name}");
        let body = serde_json::to_string(patch).map_err(|source| ServerError::Json {
            path: path.clone(),
            source,
        })?;
        self.request_ok(
            Method::Patch,
            &path,
            &[("Accept", ENVIRONMENT_ADMIN), ("Content-Type", PLAIN_JSON)],
            RequestBody::Json(body),
        )?;
        Ok(())
    }

    fn get_json(&mut self, path: &str) -> Result<Value, ServerError> {
        let response = self.request_ok(Method::Get, path, &[("Accept", PLAIN_JSON)], RequestBody::Empty)?;
        parse_json(path, &response.body)
    }
}

fn created_from_payload(payload: &Value) -> Result<CreatedPipeline, ServerError> {
    let pipeline = &payload["pipeline"];
    let name = pipeline["name"]
        .as_str()
        .ok_or_else(|| ServerError::invalid("create-a-pipeline", "missing pipeline.name"))?;
    let stages = pipeline["stages"]
        .as_array()
        .map(|stages| {
            stages
                .iter()
                .filter_map(|stage| stage["name"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    Ok(CreatedPipeline {
        name: name.to_string(),
        stages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn environment_patch_omits_empty_lists() {
        let patch = EnvironmentPatch {
            pipelines: MembershipChange {
                add: vec!["p1".into()],
                remove: vec![],
            },
            agents: MembershipChange::default(),
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"pipelines": {"add": ["p1"]}})
        );
    }

    #[test]
    fn created_pipeline_reads_stage_names() {
        let created = created_from_payload(&json!({
            "group": "g",
            "pipeline": {"name": "p", "stages": [{"name": "build"}, {"name": "test"}]}
        }))
        .unwrap();
        assert_eq!(created.name, "p");
        assert_eq!(created.stages, ["build", "test"]);

        let template = created_from_payload(&json!({"pipeline": {"name": "t", "template": "x"}})).unwrap();
        assert!(template.stages.is_empty());

        assert!(created_from_payload(&json!({"pipeline": {}})).is_err());
    }
}
