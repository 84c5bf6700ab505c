mod common;

use common::{form_field, json_response, Script, CRUISE};
use gocdpb_server::{Method, ServerError};
use serde_json::json;

fn groups_response() -> gocdpb_server::HttpResponse {
    json_response(&json!([
        {"name": "x", "pipelines": [{"name": "p"}]},
        {"name": "y", "pipelines": []}
    ]))
}

#[test]
fn rename_onto_empty_group_replaces_it() {
    let script = Script::new();
    script
        .expect(Method::Get, "/api/config/pipeline_groups", groups_response())
        .expect_config(CRUISE, "m1")
        .expect_upload();
    let mut client = script.client();

    client.rename_pipeline_group("x", "y").unwrap();

    let uploaded = form_field(&script.sent()[2], "xmlFile").to_string();
    assert!(!uploaded.contains("group=\"x\""));
    assert_eq!(uploaded.matches("group=\"y\"").count(), 1);
    assert!(uploaded.contains("<pipelines group=\"y\">\n    <pipeline name=\"p\" />"));
}

#[test]
fn move_into_new_group_keeps_source() {
    let script = Script::new();
    script
        .expect(Method::Get, "/api/config/pipeline_groups", groups_response())
        .expect_config(CRUISE, "m1")
        .expect_upload();
    let mut client = script.client();

    client.move_all_pipelines_in_group("x", "z").unwrap();

    let uploaded = form_field(&script.sent()[2], "xmlFile").to_string();
    assert!(uploaded.contains("<pipelines group=\"z\">\n    <pipeline name=\"p\" />"));
    assert!(uploaded.contains("<pipelines group=\"x\" />"));
}

#[test]
fn occupied_target_is_refused_before_fetching() {
    let script = Script::new();
    script.expect(Method::Get, "/api/config/pipeline_groups", groups_response());
    let mut client = script.client();

    let err = client.move_all_pipelines_in_group("y", "x").unwrap_err();

    match err {
        ServerError::GroupNotEmpty { group, pipelines } => {
            assert_eq!(group, "x");
            assert_eq!(pipelines, ["p"]);
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(script.sent().len(), 1);
}

#[test]
fn unknown_source_group_is_a_document_error() {
    let script = Script::new();
    script
        .expect(Method::Get, "/api/config/pipeline_groups", groups_response())
        .expect_config(CRUISE, "m1");
    let mut client = script.client();

    assert!(matches!(
        client.rename_pipeline_group("nope", "z"),
        Err(ServerError::Document(_))
    ));
}
