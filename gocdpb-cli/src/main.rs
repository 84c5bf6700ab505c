//! gocdpb: build GoCD pipelines from settings and tag the repositories
//! their builds used.
//!
//! # Usage
//!
//! ```text
//! gocdpb build [-c config.yml] [-C key=value]... (-j settings.json | -y settings.yml)
//!              [-p plugin]... [-D key=value]... [-d dump.xml] [--dump-test-config test.xml]
//! gocdpb repos <pipeline/instance> [-f json|semicolon]
//! gocdpb tag-repos [jsonfile] -t NAME [-d DIR] [-b LIST] [-B FILE] [-p] [-c] [--branch-only]
//! gocdpb update-repo-list <jsonfile> -t TAG (-r SUBSTRING | --pipeline NAME)
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    build::BuildArgs, repos::ReposArgs, tag_repos::TagReposArgs,
    update_repo_list::UpdateRepoListArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gocdpb",
    version,
    about = "Build GoCD pipelines from settings and tag the repositories they used",
    long_about = None,
)]
struct Cli {
    /// Debug logging; `build` also prints the status of created pipelines.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run settings operations against a GoCD server.
    Build(BuildArgs),

    /// Recursively list the source revisions a pipeline build used.
    Repos(ReposArgs),

    /// Tag and/or branch the Git repositories of a repository manifest.
    TagRepos(TagReposArgs),

    /// Replace a repository's revision with a tag in a repository manifest.
    UpdateRepoList(UpdateRepoListArgs),
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

const VERBOSE_FILTER: &str =
    "info,gocdpb=debug,gocdpb_core=debug,gocdpb_settings=debug,gocdpb_server=debug,gocdpb_repos=debug";

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { VERBOSE_FILTER } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Build(args) => args.run(cli.verbose),
        Commands::Repos(args) => args.run(),
        Commands::TagRepos(args) => args.run(),
        Commands::UpdateRepoList(args) => args.run(),
    }
}
