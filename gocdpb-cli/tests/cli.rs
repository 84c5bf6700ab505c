use std::fs;
use assert_cmd::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::TempDir;

fn gocdpb() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gocdpb"));
    cmd.env_remove("GOCDPB_PASSWORD").env_remove("RUST_LOG");
    cmd
}

fn manifest(entries: Value) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("repos.json");
    fs::write(&path, serde_json::to_string_pretty(&entries).unwrap()).expect("write manifest");
    (dir, path)
}

#[test]
fn help_lists_subcommands() {
    gocdpb()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("build"))
        .stdout(contains("repos"))
        .stdout(contains("tag-repos"))
        .stdout(contains("update-repo-list"));
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

#[test]
fn build_requires_server_url() {
    gocdpb()
        .arg("build")
        .assert()
        .failure()
        .stderr(contains("missing 'url' in configuration"));
}

#[test]
fn build_rejects_unknown_config_param() {
    gocdpb()
        .args(["build", "-C", "colour=blue"])
        .assert()
        .failure()
        .stderr(contains("unknown configuration parameter 'colour'"));
}

#[test]
fn build_rejects_half_a_credential_pair() {
    gocdpb()
        .args(["build", "-C", "url=http://127.0.0.1:1", "-C", "username=me"])
        .assert()
        .failure()
        .stderr(contains("need both or neither"));
}

#[test]
fn build_rejects_unknown_plugin() {
    gocdpb()
        .args(["build", "-C", "url=http://127.0.0.1:1", "-p", "my_module"])
        .assert()
        .failure()
        .stderr(contains("my_module"));
}

#[test]
fn build_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("gocd.yml");
    fs::write(&config, "url: http://127.0.0.1:1/\nusername: me\n").unwrap();

    // The password from the environment completes the pair; the server is
    // unreachable so the run stops at the first request.
    gocdpb()
        .args(["build", "-c"])
        .arg(&config)
        .env("GOCDPB_PASSWORD", "secret")
        .assert()
        .failure()
        .stderr(contains("failed to read configuration from http://127.0.0.1:1/go"));
}

#[test]
fn build_rejects_both_settings_kinds() {
    gocdpb()
        .args(["build", "-j", "a.json", "-y", "b.yml"])
        .assert()
        .failure()
        .stderr(contains("cannot be used with"));
}

// ---------------------------------------------------------------------------
// repos
// ---------------------------------------------------------------------------

#[test]
fn repos_rejects_unknown_format() {
    gocdpb()
        .args(["repos", "p/1", "-f", "xml"])
        .assert()
        .failure()
        .stderr(contains("xml"));
}

// ---------------------------------------------------------------------------
// tag-repos
// ---------------------------------------------------------------------------

#[test]
fn tag_repos_refuses_inconsistent_manifest() {
    let (_dir, path) = manifest(json!([
        {"description": "URL: /tmp/a, Branch: master", "revision": "A", "type": "Git",
         "pipelines": [{"name": "p1", "counter": "1"}]},
        {"description": "URL: /tmp/a, Branch: master", "revision": "B", "type": "Git",
         "pipelines": [{"name": "p2", "counter": 1}]}
    ]));

    gocdpb()
        .arg("tag-repos")
        .arg(&path)
        .args(["-t", "REL-1"])
        .assert()
        .failure()
        .stderr(contains("used with more than one revision"))
        .stderr(contains("p2/1"));
}

#[test]
fn tag_repos_skips_non_git_materials_from_stdin() {
    gocdpb()
        .args(["tag-repos", "-t", "REL-1"])
        .write_stdin(
            json!([{"description": "svn://host/trunk", "revision": "17", "type": "Subversion",
                    "pipelines": [{"name": "p", "counter": "2"}]}])
            .to_string(),
        )
        .assert()
        .success()
        .stderr(contains("don't know how to handle material type Subversion"));
}

#[test]
fn tag_repos_requires_tag_name() {
    gocdpb().args(["tag-repos"]).assert().failure().stderr(contains("--tag-name"));
}

// ---------------------------------------------------------------------------
// update-repo-list
// ---------------------------------------------------------------------------

#[test]
fn update_repo_list_rewrites_selected_entry() {
    let (_dir, path) = manifest(json!([
        {"description": "URL: https://h/api, Branch: master", "revision": "A", "type": "Git",
         "pipelines": [{"name": "api", "counter": "4"}]},
        {"description": "URL: https://h/web, Branch: master", "revision": "B", "type": "Git",
         "pipelines": [{"name": "web", "counter": "9"}]}
    ]));

    gocdpb()
        .arg("update-repo-list")
        .arg(&path)
        .args(["-t", "REL-1", "-r", "/api"])
        .assert()
        .success()
        .stdout(contains("Updated 1 entries"));

    let updated: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(updated[0]["tag"], "REL-1");
    assert!(updated[0].get("revision").is_none());
    assert_eq!(updated[1]["revision"], "B");
}

#[test]
fn update_repo_list_by_pipeline_warns_on_unexpected_count() {
    let (_dir, path) = manifest(json!([
        {"description": "URL: https://h/api, Branch: master", "revision": "A", "type": "Git",
         "pipelines": [{"name": "api", "counter": "4"}]}
    ]));

    gocdpb()
        .arg("update-repo-list")
        .arg(&path)
        .args(["-t", "REL-1", "--pipeline", "nope"])
        .assert()
        .success()
        .stderr(contains("expected one change"));
}

#[test]
fn update_repo_list_needs_a_selector() {
    let (_dir, path) = manifest(json!([]));
    gocdpb()
        .arg("update-repo-list")
        .arg(&path)
        .args(["-t", "REL-1"])
        .assert()
        .failure();
}
