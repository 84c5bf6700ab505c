//! Revision consistency of a Git manifest.
//!
//! A repository (identified by its description) may be used at exactly one
//! revision across the whole manifest. Anything else means the builds being
//! tagged did not agree on what they built from.

use std::collections::BTreeMap;
use std::fmt;

use gocdpb_core::{PipelineRun, RepoEntry};

use crate::error::RepoError;

/// A repository used at more than one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub description: String,
    /// Revisions in sorted order with the builds that used each.
    pub usages: Vec<(String, Vec<PipelineRun>)>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Repository {} used with more than one revision:", self.description)?;
        for (revision, builds) in &self.usages {
            let builds: Vec<String> = builds.iter().map(PipelineRun::to_string).collect();
            write!(f, "\n  revision {revision} used in build {}", builds.join(", "))?;
        }
        Ok(())
    }
}

/// Fail with [`RepoError::Inconsistent`] if any description maps to two or
/// more distinct revisions. `label` names the manifest in the error.
pub fn check_consistent(entries: &[RepoEntry], label: &str) -> Result<(), RepoError> {
    let mut revisions: BTreeMap<&str, BTreeMap<&str, Vec<PipelineRun>>> = BTreeMap::new();
    for entry in entries {
        let revision = entry
            .revision_or_tag()
            .ok_or_else(|| RepoError::MissingRevision {
                description: entry.description.clone(),
            })?;
        revisions
            .entry(entry.description.as_str())
            .or_default()
            .entry(revision)
            .or_default()
            .extend(entry.pipelines.iter().cloned());
    }

    let conflicts: Vec<Conflict> = revisions
        .into_iter()
        .filter(|(_, by_revision)| by_revision.len() > 1)
        .map(|(description, by_revision)| Conflict {
            description: description.to_string(),
            usages: by_revision
                .into_iter()
                .map(|(revision, builds)| (revision.to_string(), builds))
                .collect(),
        })
        .collect();

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(RepoError::Inconsistent {
            label: label.to_string(),
            conflicts,
        })
    }
}

/// Which manifest entries [`use_tag_in_repolist`] rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSelector {
    /// Entries whose description contains this substring.
    Repository(String),
    /// Entries used by a build of this pipeline.
    Pipeline(String),
}

impl RepoSelector {
    fn matches(&self, entry: &RepoEntry) -> bool {
        match self {
            RepoSelector::Repository(part) => entry.description.contains(part.as_str()),
            RepoSelector::Pipeline(name) => entry.pipelines.iter().any(|run| run.name == *name),
        }
    }
}

/// Copy of `entries` where every selected entry refers to `tag` instead of
/// its revision, plus the number of entries changed.
pub fn use_tag_in_repolist(
    entries: &[RepoEntry],
    tag: &str,
    selector: &RepoSelector,
) -> (Vec<RepoEntry>, usize) {
    let mut changed = 0;
    let updated = entries
        .iter()
        .cloned()
        .map(|mut entry| {
            if selector.matches(&entry) {
                entry.revision = None;
                entry.tag = Some(tag.to_string());
                changed += 1;
            }
            entry
        })
        .collect();
    (updated, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(description: &str, revision: &str, build: (&str, &str)) -> RepoEntry {
        RepoEntry {
            description: description.to_string(),
            pipelines: vec![PipelineRun::new(build.0, build.1)],
            revision: Some(revision.to_string()),
            tag: None,
            material_type: "Git".to_string(),
        }
    }

    #[test]
    fn conflicting_revisions_are_listed_with_builds() {
        let entries = [
            entry("D1", "A", ("p1", "1")),
            entry("D1", "B", ("p2", "1")),
            entry("D2", "C", ("p3", "4")),
        ];

        let err = check_consistent(&entries, "repos.json").unwrap_err();

        let RepoError::Inconsistent { label, conflicts } = &err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(label, "repos.json");
        assert_eq!(
            conflicts,
            &[Conflict {
                description: "D1".into(),
                usages: vec![
                    ("A".into(), vec![PipelineRun::new("p1", "1")]),
                    ("B".into(), vec![PipelineRun::new("p2", "1")]),
                ],
            }]
        );
        let message = err.to_string();
        assert!(message.contains("Repository D1 used with more than one revision"));
        assert!(message.contains("revision B used in build p2/1"));
    }

    #[rstest]
    #[case::distinct_repos(vec![entry("D1", "A", ("p1", "1")), entry("D2", "B", ("p2", "1"))])]
    #[case::same_revision_twice(vec![entry("D1", "A", ("p1", "1")), entry("D1", "A", ("p2", "7"))])]
    #[case::empty(vec![])]
    fn consistent_manifests_pass(#[case] entries: Vec<RepoEntry>) {
        check_consistent(&entries, "m").unwrap();
    }

    #[test]
    fn tag_counts_as_revision() {
        let mut tagged = entry("D1", "", ("p1", "1"));
        tagged.tag = Some("v1".into());
        let entries = [tagged, entry("D1", "A", ("p2", "1"))];
        assert!(check_consistent(&entries, "m").is_err());

        let mut bare = entry("D1", "", ("p1", "1"));
        bare.revision = None;
        assert!(matches!(
            check_consistent(&[bare], "m"),
            Err(RepoError::MissingRevision { .. })
        ));
    }

    #[rstest]
    #[case::by_repository(RepoSelector::Repository("/api".into()), 1)]
    #[case::by_pipeline(RepoSelector::Pipeline("p2".into()), 1)]
    #[case::nothing(RepoSelector::Pipeline("nope".into()), 0)]
    fn repolist_tag_substitution(#[case] selector: RepoSelector, #[case] expected: usize) {
        let entries = [
            entry("URL: https://h/api, Branch: master", "A", ("p1", "1")),
            entry("URL: https://h/web, Branch: master", "B", ("p2", "3")),
        ];

        let (updated, changed) = use_tag_in_repolist(&entries, "REL-1", &selector);

        assert_eq!(changed, expected);
        let tagged: Vec<_> = updated.iter().filter(|e| e.tag.is_some()).collect();
        assert_eq!(tagged.len(), expected);
        for entry in tagged {
            assert_eq!(entry.revision, None);
            assert_eq!(entry.revision_or_tag(), Some("REL-1"));
        }
        // The input is left alone.
        assert!(entries.iter().all(|e| e.tag.is_none()));
    }
}
