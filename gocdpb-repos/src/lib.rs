//! # gocdpb-repos
//!
//! Git-manifest tooling: the revision consistency check, tag substitution in
//! repo lists, and cloning/tagging/branching of the listed repositories.

pub mod consistency;
pub mod error;
pub mod git;
pub mod manifest;
pub mod tagging;

pub use consistency::{check_consistent, use_tag_in_repolist, Conflict, RepoSelector};
pub use error::RepoError;
pub use git::{repo_name_from_url, GitRunner, GitTagger, ProcessGit};
pub use manifest::{parse_manifest, read_manifest, to_pretty_json, write_manifest};
pub use tagging::{branch_or_tag_repos, branch_set, parse_description, RepoLocation, TagOptions, TagSummary};
