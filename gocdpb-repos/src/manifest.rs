//! Reading and writing Git manifests (`[{description, revision|tag, type, pipelines}]`).

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use gocdpb_core::RepoEntry;

use crate::error::{io_err, RepoError};

/// Parse manifest text; `label` names its origin in errors.
pub fn parse_manifest(text: &str, label: &str) -> Result<Vec<RepoEntry>, RepoError> {
    serde_json::from_str(text).map_err(|source| RepoError::Json {
        label: label.to_string(),
        source,
    })
}

pub fn read_manifest(path: &Path) -> Result<Vec<RepoEntry>, RepoError> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse_manifest(&text, &path.display().to_string())
}

/// JSON with four-space indentation.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, RepoError> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut serializer)
        .map_err(|source| RepoError::Json {
            label: "output".to_string(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn write_manifest(path: &Path, entries: &[RepoEntry]) -> Result<(), RepoError> {
    let mut text = to_pretty_json(entries)?;
    text.push('\n');
    fs::write(path, text).map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_may_be_strings_or_numbers() {
        let entries = parse_manifest(
            r#"[{"description": "URL: u, Branch: b", "revision": "r", "type": "Git",
                 "pipelines": [{"name": "a", "counter": "3"}, {"name": "b", "counter": 4}]}]"#,
            "m",
        )
        .unwrap();
        assert_eq!(entries[0].pipelines[0].counter, "3");
        assert_eq!(entries[0].pipelines[1].counter, "4");
    }

    #[test]
    fn output_uses_sorted_keys_and_four_spaces() {
        let entries = parse_manifest(
            r#"[{"type": "Git", "tag": "v1", "description": "d", "pipelines": []}]"#,
            "m",
        )
        .unwrap();
        assert_eq!(
            to_pretty_json(&entries).unwrap(),
            "[\n    {\n        \"description\": \"d\",\n        \"pipelines\": [],\n        \"tag\": \"v1\",\n        \"type\": \"Git\"\n    }\n]"
        );
    }

    #[test]
    fn broken_manifest_names_its_source() {
        let err = parse_manifest("{", "repos.json").unwrap_err();
        assert!(err.to_string().contains("repos.json"));
    }
}
