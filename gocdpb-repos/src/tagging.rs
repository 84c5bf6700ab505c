//! Tag or branch every Git repository of a manifest.
//!
//! Per repository, in this order:
//!
//! 1. skip non-Git materials (with a warning)
//! 2. branch if any of its builds belongs to a pipeline in the branch set,
//!    otherwise tag (or skip, when tagging is disabled)
//! 3. clone and check out the description's branch
//! 4. create the tag or branch at the recorded revision
//! 5. push it to `origin` when asked
//! 6. remove the clone when asked

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, warn};

use gocdpb_core::RepoEntry;

use crate::error::RepoError;
use crate::git::{GitRunner, GitTagger};

/// Where a repository lives, parsed from `URL: <url>, Branch: <branch>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub url: String,
    pub branch: String,
}

pub fn parse_description(description: &str) -> Result<RepoLocation, RepoError> {
    let malformed = || RepoError::Description(description.to_string());
    let (url_part, branch_part) = description.split_once(',').ok_or_else(malformed)?;
    let value = |part: &str| {
        part.split_once(':')
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(malformed)
    };
    Ok(RepoLocation {
        url: value(url_part)?,
        branch: value(branch_part)?,
    })
}

/// Pipeline names from a comma-separated list and from the non-blank lines
/// of a file's contents.
pub fn branch_set(inline: Option<&str>, file_contents: Option<&str>) -> BTreeSet<String> {
    let inline = inline.into_iter().flat_map(|list| list.split(','));
    let lines = file_contents.into_iter().flat_map(str::lines);
    inline
        .chain(lines)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone)]
pub struct TagOptions {
    /// Name of the tag or branch to create.
    pub name: String,
    /// Parent directory of the clones.
    pub directory: PathBuf,
    /// Pipelines whose repositories get a branch instead of a tag.
    pub branch_set: BTreeSet<String>,
    pub push: bool,
    pub clean: bool,
    /// When `false`, repositories not selected for branching are skipped.
    pub tag: bool,
}

/// What [`branch_or_tag_repos`] did, by repository URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSummary {
    pub tagged: Vec<String>,
    pub branched: Vec<String>,
    pub skipped: Vec<String>,
}

pub fn branch_or_tag_repos(
    git: &dyn GitRunner,
    entries: &[RepoEntry],
    options: &TagOptions,
) -> Result<TagSummary, RepoError> {
    let mut summary = TagSummary::default();

    for entry in entries {
        if !entry.is_git() {
            warn!(
                description = %entry.description,
                "don't know how to handle material type {}",
                entry.material_type
            );
            summary.skipped.push(entry.description.clone());
            continue;
        }

        let should_branch = entry
            .pipelines
            .iter()
            .any(|run| options.branch_set.contains(&run.name));
        if !(options.tag || should_branch) {
            debug!(description = %entry.description, "not selected for branching");
            summary.skipped.push(entry.description.clone());
            continue;
        }

        let location = parse_description(&entry.description)?;
        let revision = entry
            .revision_or_tag()
            .ok_or_else(|| RepoError::MissingRevision {
                description: entry.description.clone(),
            })?;

        let mut tagger = GitTagger::new(git, &options.directory);
        tagger.clone(&location.url, &location.branch)?;
        if should_branch {
            tagger.branch(&options.name, revision)?;
            summary.branched.push(location.url.clone());
        } else {
            tagger.tag(&options.name, revision)?;
            summary.tagged.push(location.url.clone());
        }
        if options.push {
            tagger.push(&options.name)?;
        }
        if options.clean {
            tagger.clean()?;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn description_splits_into_url_and_branch() {
        assert_eq!(
            parse_description("URL: https://host/api.git, Branch: release-1").unwrap(),
            RepoLocation {
                url: "https://host/api.git".into(),
                branch: "release-1".into(),
            }
        );
    }

    #[rstest]
    #[case("URL: /tmp/a")]
    #[case("/tmp/a, master")]
    #[case("URL: , Branch: master")]
    fn malformed_descriptions(#[case] description: &str) {
        assert!(matches!(
            parse_description(description),
            Err(RepoError::Description(d)) if d == description
        ));
    }

    #[test]
    fn branch_set_merges_list_and_file() {
        let set = branch_set(Some(" a, b,,"), Some("c\n\n  d  \nb\n"));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), ["a", "b", "c", "d"]);
        assert!(branch_set(None, None).is_empty());
    }
}
