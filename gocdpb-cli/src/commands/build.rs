//! `gocdpb build`: run settings operations and dump the resulting config.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::builder::PossibleValuesParser;
use clap::Args;
use colored::Colorize;

use gocdpb_server::{ActionRegistry, OperationRunner, PLUGIN_NAMES};
use gocdpb_settings::{defines_from_pairs, GitCheckoutDefaults, Settings};

use super::{parse_key_value, ServerArgs, XML_DECLARATION};

/// Arguments for `gocdpb build`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// JSON settings template: a file path or an http(s) URL.
    #[arg(short = 'j', long = "json-settings", conflicts_with = "yaml_settings")]
    pub json_settings: Option<String>,

    /// YAML file naming a JSON settings template and its parameters.
    #[arg(short = 'y', long = "yaml-settings")]
    pub yaml_settings: Option<PathBuf>,

    /// Built-in plugin whose operation keys to enable.
    #[arg(short = 'p', long = "plugin", value_parser = PossibleValuesParser::new(PLUGIN_NAMES))]
    pub plugins: Vec<String>,

    /// Define a settings template parameter.
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub defines: Vec<(String, String)>,

    /// Write the resulting configuration XML to this file.
    #[arg(short = 'd', long = "dump", value_name = "FILE")]
    pub dump: Option<PathBuf>,

    /// Write the pipelines/templates/environments subset to this file.
    #[arg(long, value_name = "FILE")]
    pub dump_test_config: Option<PathBuf>,
}

impl BuildArgs {
    pub fn run(self, verbose: bool) -> Result<()> {
        let mut client = self.server.connect()?;

        if let Some(settings) = self.load_settings()? {
            let registry = ActionRegistry::with_plugins(self.plugins.iter().map(String::as_str))?;
            let report = OperationRunner::new(&registry)
                .verbose(verbose)
                .on_status(print_status)
                .run(&mut client, &settings.operations)
                .context("settings operations failed")?;
            for name in &report.created {
                println!("{} Created pipeline '{name}'", "✓".green());
            }
        }

        if let Some(path) = &self.dump {
            client.fetch().context("failed to re-read configuration")?;
            write_dump(path, &client.cruise_xml()?)?;
        }
        if let Some(path) = &self.dump_test_config {
            client.fetch().context("failed to re-read configuration")?;
            write_dump(path, &client.cruise_xml_subset()?)?;
        }
        Ok(())
    }

    fn load_settings(&self) -> Result<Option<Settings>> {
        let defines = defines_from_pairs(
            self.defines
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );
        let cwd = std::env::current_dir().context("could not determine working directory")?;
        let defaults = GitCheckoutDefaults::new(cwd);

        if let Some(source) = &self.json_settings {
            let template = read_json_settings(source)?;
            let settings = Settings::from_json_template(&template, &defines, &defaults)
                .with_context(|| format!("invalid settings {source}"))?;
            return Ok(Some(settings));
        }
        if let Some(path) = &self.yaml_settings {
            let settings = Settings::from_yaml_file(path, &defines, &defaults)
                .with_context(|| format!("invalid settings {}", path.display()))?;
            return Ok(Some(settings));
        }
        Ok(None)
    }
}

fn read_json_settings(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = ureq::get(source)
            .call()
            .with_context(|| format!("failed to fetch settings from {source}"))?;
        if response.status() != 200 {
            bail!("fetching {source} returned status {}", response.status());
        }
        return response
            .into_string()
            .with_context(|| format!("failed to read settings from {source}"));
    }
    fs::read_to_string(source).with_context(|| format!("failed to read {source}"))
}

fn print_status(name: &str, status: &serde_json::Value) {
    let pretty = serde_json::to_string_pretty(status).unwrap_or_else(|_| status.to_string());
    println!("{name}:\n{pretty}");
}

fn write_dump(path: &Path, xml: &str) -> Result<()> {
    fs::write(path, format!("{XML_DECLARATION}{xml}"))
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}
