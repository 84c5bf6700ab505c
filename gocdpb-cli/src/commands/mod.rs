pub mod build;
pub mod repos;
pub mod tag_repos;
pub mod update_repo_list;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use gocdpb_core::{ServerConfig, ServerSettings};
use gocdpb_server::ConfigClient;

/// Prefix of every dumped configuration file.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Connection options shared by the commands that talk to the server.
#[derive(Args, Debug)]
pub struct ServerArgs {
    /// YAML file with `url`, `username`, `password` and `timeout_secs`.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Override a configuration value, e.g. `-C url=https://ci.example.com`.
    #[arg(short = 'C', long = "config-param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub config_params: Vec<(String, String)>,

    /// Server password.
    #[arg(long, env = "GOCDPB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Replace the pipelines, templates and environments sections with those
    /// of this XML file before anything else. (For test setup.)
    #[arg(long, value_name = "FILE")]
    pub set_test_config: Option<PathBuf>,
}

impl ServerArgs {
    pub fn settings(&self) -> Result<ServerSettings> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load_at(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ServerConfig::default(),
        };
        config.apply_overrides(
            self.config_params
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        )?;
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        Ok(config.validate()?)
    }

    /// Connected client holding the server's current configuration, with
    /// the test configuration applied when one was given.
    pub fn connect(&self) -> Result<ConfigClient> {
        let settings = self.settings()?;
        let mut client = ConfigClient::connect(&settings);
        client
            .refresh()
            .with_context(|| format!("failed to read configuration from {}", settings.base_url))?;

        if let Some(path) = &self.set_test_config {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let uploaded = client
                .apply_test_config(&xml)
                .with_context(|| format!("failed to apply test configuration {}", path.display()))?;
            if uploaded {
                println!("{} Applied test configuration {}", "✓".green(), path.display());
            } else {
                info!("test configuration already in place");
            }
        }
        Ok(client)
    }
}

/// Parse `KEY=VALUE`; the value may itself contain `=`.
pub fn parse_key_value(text: &str) -> Result<(String, String), String> {
    text.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{text}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("url=http://h/?a=b").unwrap(),
            ("url".to_string(), "http://h/?a=b".to_string())
        );
        assert!(parse_key_value("url").is_err());
    }
}
