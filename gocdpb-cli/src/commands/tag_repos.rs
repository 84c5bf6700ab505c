//! `gocdpb tag-repos`: tag or branch every Git repository of a manifest.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use gocdpb_repos::{
    branch_or_tag_repos, branch_set, check_consistent, parse_manifest, ProcessGit, TagOptions,
};

/// Arguments for `gocdpb tag-repos`.
#[derive(Args, Debug)]
pub struct TagReposArgs {
    /// Repository manifest as written by `gocdpb repos`. Read from stdin when
    /// omitted.
    pub jsonfile: Option<PathBuf>,

    /// Parent directory of the repository clones.
    #[arg(short = 'd', long = "directory", default_value = "/tmp")]
    pub directory: PathBuf,

    /// Name of the tag or branch to create.
    #[arg(short = 't', long = "tag-name")]
    pub tag_name: String,

    /// Comma-separated pipeline names whose repositories get a branch.
    #[arg(short = 'b', long = "branch-list")]
    pub branch_list: Option<String>,

    /// File with one pipeline name per line whose repositories get a branch.
    #[arg(short = 'B', long = "branch-list-from-file")]
    pub branch_list_from_file: Option<PathBuf>,

    /// Push the new tag or branch to `origin`.
    #[arg(short = 'p', long)]
    pub push: bool,

    /// Remove the clones afterwards.
    #[arg(short = 'c', long)]
    pub clean: bool,

    /// Only create branches; skip repositories that would be tagged.
    #[arg(long)]
    pub branch_only: bool,
}

impl TagReposArgs {
    pub fn run(self) -> Result<()> {
        let (text, label) = match &self.jsonfile {
            Some(path) => (
                fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                path.display().to_string(),
            ),
            None => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("failed to read manifest from stdin")?;
                (text, "<stdin>".to_string())
            }
        };
        let entries = parse_manifest(&text, &label)?;
        check_consistent(&entries, &label)?;

        let file_contents = match &self.branch_list_from_file {
            Some(path) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
            ),
            None => None,
        };
        let options = TagOptions {
            name: self.tag_name.clone(),
            directory: self.directory.clone(),
            branch_set: branch_set(self.branch_list.as_deref(), file_contents.as_deref()),
            push: self.push,
            clean: self.clean,
            tag: !self.branch_only,
        };

        let summary = branch_or_tag_repos(&ProcessGit, &entries, &options)?;
        for url in &summary.tagged {
            println!("{} Tagged {url} with {}", "✓".green(), self.tag_name);
        }
        for url in &summary.branched {
            println!("{} Branched {url} with {}", "✓".green(), self.tag_name);
        }
        Ok(())
    }
}
