//! `gocdpb repos`: source revisions used by a pipeline build and its
//! upstream builds.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use gocdpb_repos::to_pretty_json;
use gocdpb_server::collect_source_materials;
use gocdpb_server::materials::{to_manifest, to_semicolon_lines};

use super::ServerArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Repository manifest, as read by `tag-repos`.
    Json,
    /// `type; description; revision; pipeline/counter, ...` per line.
    Semicolon,
}

/// Arguments for `gocdpb repos`.
#[derive(Args, Debug)]
pub struct ReposArgs {
    /// `pipeline/instance` to start at.
    pub pipeline_instance: String,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub server: ServerArgs,
}

impl ReposArgs {
    pub fn run(self) -> Result<()> {
        let mut client = self.server.connect()?;
        let usage = collect_source_materials(&mut client, &self.pipeline_instance)
            .with_context(|| format!("failed to walk {}", self.pipeline_instance))?;

        match self.format {
            OutputFormat::Json => println!("{}", to_pretty_json(&to_manifest(&usage))?),
            OutputFormat::Semicolon => {
                for line in to_semicolon_lines(&usage) {
                    println!("{line}");
                }
            }
        }
        Ok(())
    }
}
