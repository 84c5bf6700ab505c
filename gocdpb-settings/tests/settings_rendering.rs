use std::fs;

use gocdpb_settings::{defines_from_pairs, GitCheckoutDefaults, Settings};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

const TEMPLATE: &str = r#"[
    {
        "create-a-pipeline": {
            "group": "{{ group }}",
            "pipeline": {"name": "{{ repo_name }}-{{ suffix }}"}
        },
        "environment": "{{ env }}"
    },
    {"unpause": true}
]"#;

fn checkout(tmp: &TempDir) -> GitCheckoutDefaults {
    let root = tmp.path().join("svc");
    fs::create_dir_all(&root).expect("create checkout");
    GitCheckoutDefaults::new(root)
}

#[test]
fn json_template_uses_defaults_and_defines() {
    let tmp = TempDir::new().expect("tmp");
    let defines = defines_from_pairs([
        ("group", "backend"),
        ("suffix", "build"),
        ("env", "dev"),
    ]);

    let settings =
        Settings::from_json_template(TEMPLATE, &defines, &checkout(&tmp)).expect("render");

    assert_eq!(settings.operations.len(), 2);
    assert_eq!(
        Value::Object(settings.operations[0].clone()),
        json!({
            "create-a-pipeline": {"group": "backend", "pipeline": {"name": "svc-build"}},
            "environment": "dev"
        })
    );
    assert_eq!(settings.operations[1]["unpause"], json!(true));
}

#[test]
fn yaml_parameters_sit_between_defaults_and_defines() {
    let tmp = TempDir::new().expect("tmp");
    let template_path = tmp.path().join("pipeline.json");
    fs::write(&template_path, TEMPLATE).expect("write template");
    let yaml_path = tmp.path().join("settings.yaml");
    fs::write(
        &yaml_path,
        format!(
            "path: {}\nparameters:\n  group: from-yaml\n  suffix: yaml\n  env: test\n  repo_name: override\n",
            template_path.display()
        ),
    )
    .expect("write yaml");
    let defines = defines_from_pairs([("env", "prod")]);

    let settings =
        Settings::from_yaml_file(&yaml_path, &defines, &checkout(&tmp)).expect("render");

    let create = &settings.operations[0]["create-a-pipeline"];
    assert_eq!(create["group"], "from-yaml");
    assert_eq!(create["pipeline"]["name"], "override-yaml");
    assert_eq!(settings.operations[0]["environment"], "prod");
}

#[test]
fn yaml_pointing_at_missing_template_fails() {
    let tmp = TempDir::new().expect("tmp");
    let yaml_path = tmp.path().join("settings.yaml");
    fs::write(&yaml_path, "path: /definitely/not/here.json\n").expect("write yaml");

    let err = Settings::from_yaml_file(&yaml_path, &Map::new(), &Map::<String, Value>::new())
        .unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.json"));
}
