//! Server connection settings.
//!
//! Values are layered in this order, later wins:
//! 1. YAML file (`-c/--config`)
//! 2. `key=value` overrides (`-C/--config-param`)
//! 3. the password flag / `GOCDPB_PASSWORD`
//!
//! [`ServerConfig::validate`] turns the layered values into
//! [`ServerSettings`], failing on a missing URL or half a credential pair.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Raw, possibly incomplete configuration as read from disk and flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ServerConfig {
    /// Load from a YAML file. An empty file yields the default config.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply one `key=value` override.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "url" => self.url = Some(value.to_string()),
            "username" => self.username = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "timeout_secs" => {
                let secs = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                self.timeout_secs = Some(secs);
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn apply_overrides<'a, I>(&mut self, pairs: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in pairs {
            self.apply_override(key, value)?;
        }
        Ok(())
    }

    /// Fail closed on missing or partial settings.
    pub fn validate(&self) -> Result<ServerSettings, ConfigError> {
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingUrl)?;

        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialCredentials),
        };

        Ok(ServerSettings {
            base_url: normalise_base_url(url),
            credentials,
            timeout: self.timeout_secs.map(Duration::from_secs),
        })
    }
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Server root ending in `/go`, without a trailing slash.
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub timeout: Option<Duration>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn normalise_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/go") {
        trimmed.to_string()
    } else {
        info!(url = %trimmed, "appending /go to server url");
        format!("{trimmed}/go")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://ci:8153", "http://ci:8153/go")]
    #[case("http://ci:8153/", "http://ci:8153/go")]
    #[case("http://ci:8153/go", "http://ci:8153/go")]
    #[case("http://ci:8153/go/", "http://ci:8153/go")]
    fn base_url_is_normalised(#[case] url: &str, #[case] expected: &str) {
        let config = ServerConfig {
            url: Some(url.to_string()),
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap().base_url, expected);
    }

    #[test]
    fn missing_url_fails() {
        assert!(matches!(
            ServerConfig::default().validate(),
            Err(ConfigError::MissingUrl)
        ));
    }

    #[rstest]
    #[case(Some("me"), None)]
    #[case(None, Some("secret"))]
    fn partial_credentials_fail(#[case] username: Option<&str>, #[case] password: Option<&str>) {
        let config = ServerConfig {
            url: Some("http://ci".to_string()),
            username: username.map(String::from),
            password: password.map(String::from),
            timeout_secs: None,
        };
        assert!(matches!(config.validate(), Err(ConfigError::PartialCredentials)));
    }

    #[test]
    fn overrides_layer_over_yaml() {
        let mut config =
            ServerConfig::from_yaml_str("url: http://a\nusername: me\npassword: x\n").unwrap();
        config
            .apply_overrides([("url", "http://b/"), ("timeout_secs", "30")])
            .unwrap();
        let settings = config.validate().unwrap();
        assert_eq!(settings.base_url, "http://b/go");
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.credentials.unwrap().username, "me");
    }

    #[test]
    fn unknown_override_and_bad_value_rejected() {
        let mut config = ServerConfig::default();
        assert!(matches!(
            config.apply_override("colour", "blue"),
            Err(ConfigError::UnknownKey(key)) if key == "colour"
        ));
        assert!(matches!(
            config.apply_override("timeout_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unknown_yaml_key_rejected() {
        assert!(ServerConfig::from_yaml_str("uri: http://a\n").is_err());
    }

    #[test]
    fn load_at_reads_file_and_accepts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gocd.yaml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(ServerConfig::load_at(&path).unwrap(), ServerConfig::default());

        std::fs::write(&path, "url: http://ci\n").unwrap();
        assert_eq!(
            ServerConfig::load_at(&path).unwrap().url.as_deref(),
            Some("http://ci")
        );

        let missing = dir.path().join("nope.yaml");
        assert!(matches!(
            ServerConfig::load_at(&missing),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn debug_hides_password() {
        let credentials = Credentials {
            username: "me".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
