//! Configuration management

use serde::Deserialize;
use std::path::Path;

use topicbridge_core::{BindingConfig, ServiceConfig};

/// Main configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub binding: BindingConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            binding: BindingConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Without an explicit path an optional `topicbridge.{toml,yaml,json}` in
    /// the working directory is used. Environment variables such as
    /// `TOPICBRIDGE_SERVICE__ENDPOINT` take precedence over the file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("topicbridge").required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            .add_source(environment());

        Self::build(builder)
    }

    /// Reject values that would make every normalized address unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        self.service.validate()?;
        Ok(())
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> anyhow::Result<Self> {
        let config = builder.build()?.try_deserialize::<Config>()?;
        config.validate()?;
        Ok(config)
    }
}

/// `TOPICBRIDGE_` variables, with `__` separating nested keys
fn environment() -> config::Environment {
    config::Environment::with_prefix("TOPICBRIDGE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};
    use topicbridge_core::DuplicatePolicy;

    fn from_toml(text: &str) -> Config {
        let builder =
            config::Config::builder().add_source(File::from_str(text, FileFormat::Toml));
        Config::build(builder).unwrap()
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = from_toml("");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.service.local_host(), "localhost:4566");
        assert_eq!(config.binding.duplicate_policy, DuplicatePolicy::Allow);
    }

    #[test]
    fn test_sections_are_read() {
        let config = from_toml(
            r#"
            log_level = "debug"

            [service]
            endpoint = "http://emulator:4510"
            region = "eu-west-1"
            local_host = "127.0.0.1:4510"

            [binding]
            duplicate_policy = "reject"
            "#,
        );

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service.region, "eu-west-1");
        assert_eq!(config.service.endpoint_url().as_deref(), Some("http://emulator:4510"));
        assert_eq!(config.service.local_host(), "127.0.0.1:4510");
        assert_eq!(config.binding.duplicate_policy, DuplicatePolicy::Reject);
    }

    fn from_env(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: config::Map<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Config::build(config::Config::builder().add_source(environment().source(Some(vars))))
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        let config = from_env(&[
            ("TOPICBRIDGE_SERVICE__ENDPOINT", "http://emulator:4510"),
            ("TOPICBRIDGE_SERVICE__LOCAL_HOST", "127.0.0.1:4510"),
            ("TOPICBRIDGE_BINDING__DUPLICATE_POLICY", "reject"),
            ("TOPICBRIDGE_LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(config.service.endpoint.as_deref(), Some("http://emulator:4510"));
        assert_eq!(config.service.local_host(), "127.0.0.1:4510");
        assert_eq!(config.binding.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_environment_ignores_other_prefixes() {
        let config = from_env(&[("OTHER_SERVICE__ENDPOINT", "http://emulator:4510")]).unwrap();
        assert_eq!(config.service.endpoint.as_deref(), Some("http://localhost:4566"));
    }

    #[test]
    fn test_local_host_with_scheme_fails_to_load() {
        let builder = config::Config::builder().add_source(File::from_str(
            "[service]\nlocal_host = \"http://localhost:4566\"\n",
            FileFormat::Toml,
        ));
        assert!(Config::build(builder).is_err());

        assert!(from_env(&[("TOPICBRIDGE_SERVICE__LOCAL_HOST", "localhost:4566/")]).is_err());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/topicbridge.toml")));
        assert!(err.is_err());
    }
}
