//! Git subprocesses and the per-repository tagger.
//!
//! Every command runs with its working directory set on the child process.
//! The tool's own working directory is never changed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{io_err, RepoError};

/// Runs one `git` command in `dir` and returns its combined output.
pub trait GitRunner {
    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, RepoError>;
}

/// The installed `git` executable.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessGit;

impl GitRunner for ProcessGit {
    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, RepoError> {
        let command = format!("git {}", args.join(" "));
        debug!(dir = %dir.display(), "{command}");

        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| io_err(dir, e))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim().to_owned();
        if !text.is_empty() {
            debug!("{text}");
        }

        if output.status.success() {
            Ok(text)
        } else {
            Err(RepoError::Git {
                command,
                output: text,
                exit_code: output.status.code(),
            })
        }
    }
}

/// Local directory name `git clone` picks for `url`.
pub fn repo_name_from_url(url: &str) -> &str {
    let base = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url);
    base.strip_suffix(".git").unwrap_or(base)
}

// ---------------------------------------------------------------------------
// GitTagger
// ---------------------------------------------------------------------------

/// Clones one repository under `directory` and tags, branches, pushes and
/// removes that clone.
pub struct GitTagger<'g> {
    git: &'g dyn GitRunner,
    directory: PathBuf,
    repo_name: Option<String>,
}

impl<'g> GitTagger<'g> {
    pub fn new(git: &'g dyn GitRunner, directory: impl Into<PathBuf>) -> Self {
        Self {
            git,
            directory: directory.into(),
            repo_name: None,
        }
    }

    /// Directory of the current clone.
    pub fn repo_dir(&self) -> Result<PathBuf, RepoError> {
        self.repo_name
            .as_ref()
            .map(|name| self.directory.join(name))
            .ok_or(RepoError::NotCloned)
    }

    /// Clone `url` and check out `branch`. Values from the manifest follow
    /// `--` so git never reads them as options; `checkout` has no such
    /// separator for branches, so an option-like branch is refused.
    pub fn clone(&mut self, url: &str, branch: &str) -> Result<(), RepoError> {
        if branch.starts_with('-') {
            return Err(RepoError::OptionLike {
                value: branch.to_string(),
            });
        }
        self.git.run(&self.directory, &["clone", "--", url])?;
        self.repo_name = Some(repo_name_from_url(url).to_string());
        self.git.run(&self.repo_dir()?, &["checkout", branch])?;
        Ok(())
    }

    /// Lightweight tag at `revision`. An existing tag is not an error.
    pub fn tag(&self, name: &str, revision: &str) -> Result<(), RepoError> {
        let dir = self.repo_dir()?;
        match self.git.run(&dir, &["tag", "--", name, revision]) {
            Ok(_) => {}
            Err(RepoError::Git { output, .. }) if output.contains("already exists") => {
                info!("tag {name} already exists, continuing");
            }
            Err(e) => return Err(e),
        }
        info!("tagged {}:{revision} with {name}", self.display_name());
        Ok(())
    }

    pub fn branch(&self, name: &str, revision: &str) -> Result<(), RepoError> {
        self.git.run(&self.repo_dir()?, &["branch", "--", name, revision])?;
        info!("branched {}:{revision} with {name}", self.display_name());
        Ok(())
    }

    pub fn push(&self, refname: &str) -> Result<(), RepoError> {
        self.git.run(&self.repo_dir()?, &["push", "--", "origin", refname])?;
        Ok(())
    }

    /// Remove the clone.
    pub fn clean(&mut self) -> Result<(), RepoError> {
        let dir = self.repo_dir()?;
        fs::remove_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        self.repo_name = None;
        Ok(())
    }

    fn display_name(&self) -> &str {
        self.repo_name.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/tmp/test1", "test1")]
    #[case("https://host/group/api.git", "api")]
    #[case("https://host/group/api/", "api")]
    #[case("git@host:group/web.git", "web")]
    #[case("plain", "plain")]
    fn clone_directory_name(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(repo_name_from_url(url), expected);
    }

    #[test]
    fn operations_need_a_clone_first() {
        let tagger = GitTagger::new(&ProcessGit, "/nonexistent");
        assert!(matches!(tagger.tag("t", "abc"), Err(RepoError::NotCloned)));
        assert!(matches!(tagger.push("t"), Err(RepoError::NotCloned)));
    }

    #[test]
    fn option_like_branch_is_refused_before_cloning() {
        let mut tagger = GitTagger::new(&ProcessGit, "/nonexistent");
        let err = tagger.clone("https://host/api.git", "--upload-pack=x").unwrap_err();
        assert!(matches!(err, RepoError::OptionLike { value } if value == "--upload-pack=x"));
    }
}
