//! `gocdpb update-repo-list`: point manifest entries at a tag instead of a
//! revision.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgGroup, Args};
use colored::Colorize;
use tracing::warn;

use gocdpb_repos::{check_consistent, read_manifest, use_tag_in_repolist, write_manifest, RepoSelector};

/// Arguments for `gocdpb update-repo-list`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("selector").required(true).args(["repository", "pipeline"])))]
pub struct UpdateRepoListArgs {
    /// Repository manifest to rewrite in place.
    pub jsonfile: PathBuf,

    /// Tag to refer to.
    #[arg(short = 't', long = "tag-name")]
    pub tag_name: String,

    /// Substring of the repository description.
    #[arg(short = 'r', long)]
    pub repository: Option<String>,

    /// Name of a pipeline whose repositories to update.
    #[arg(long)]
    pub pipeline: Option<String>,
}

impl UpdateRepoListArgs {
    pub fn run(self) -> Result<()> {
        let label = self.jsonfile.display().to_string();
        let entries = read_manifest(&self.jsonfile)?;
        check_consistent(&entries, &label)?;

        let selector = match (self.repository, self.pipeline) {
            (Some(repository), _) => RepoSelector::Repository(repository),
            (None, Some(pipeline)) => RepoSelector::Pipeline(pipeline),
            (None, None) => bail!("give a repository substring or a pipeline name"),
        };
        let (updated, changed) = use_tag_in_repolist(&entries, &self.tag_name, &selector);
        if changed != 1 {
            warn!("expected one change in {label}, but made {changed}");
        }
        check_consistent(&updated, &label)?;

        write_manifest(&self.jsonfile, &updated)?;
        println!("{} Updated {changed} entries in {label}", "✓".green());
        Ok(())
    }
}
