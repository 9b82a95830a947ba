// ABOUTME: Configuration types and parsing for strato.yml.
// ABOUTME: Handles YAML parsing, environment overlays, and config discovery.

mod environment;

pub use environment::{ApprovalPolicy, Environment, EnvironmentPolicy, ParseEnvironmentError};

use crate::error::{Error, Result};
use crate::types::{ResourceId, StackName};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "strato.yml";
pub const CONFIG_FILENAME_ALT: &str = "strato.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".strato/config.yml";

/// Environment variable overriding the region from the config file.
pub const REGION_ENV_VAR: &str = "STRATO_REGION";
/// Environment variable overriding the expected account identifier used by
/// the approval gate's identity cross-check.
pub const ACCOUNT_ENV_VAR: &str = "STRATO_ACCOUNT_ID";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_stack_name")]
    pub stack: StackName,

    /// Path to the stack template handed to the provisioning system.
    #[serde(default)]
    pub template: Option<PathBuf>,

    #[serde(default)]
    pub region: Option<String>,

    /// Expected account identifier for the approval gate's cross-check.
    #[serde(default)]
    pub account_id: Option<String>,

    /// Provider CLI binary used by the shipped provisioner binding.
    #[serde(default = "default_provider_cli")]
    pub provider_cli: String,

    /// Data-store identifier inspected by checks and snapshotted on teardown.
    #[serde(default)]
    pub data_store: Option<ResourceId>,

    /// Network identifier inspected by the connectivity checks.
    #[serde(default)]
    pub network: Option<ResourceId>,

    /// Estimated monthly cost of the stack, compared against the tier's
    /// budget ceiling by the cost checks.
    #[serde(default)]
    pub estimated_monthly_cost_usd: Option<u32>,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverlay>,
}

/// Per-environment overrides merged over the base config.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnvironmentOverlay {
    #[serde(default, deserialize_with = "deserialize_stack_name_option")]
    pub stack: Option<StackName>,

    #[serde(default)]
    pub template: Option<PathBuf>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub data_store: Option<ResourceId>,

    #[serde(default)]
    pub network: Option<ResourceId>,

    #[serde(default)]
    pub estimated_monthly_cost_usd: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_poll_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            timeout: default_poll_timeout(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_provider_cli() -> String {
    "aws".to_string()
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Merge the overlay for the given environment over the base config.
    ///
    /// A missing overlay is fine (the base config applies unchanged); an
    /// overlay keyed by an unknown environment name is caught at parse time
    /// by `validate_overlay_keys`.
    pub fn for_environment(&self, environment: Environment) -> Config {
        let mut merged = self.clone();

        if let Some(overlay) = self.environments.get(&environment.to_string()) {
            if let Some(ref stack) = overlay.stack {
                merged.stack = stack.clone();
            }
            if overlay.template.is_some() {
                merged.template = overlay.template.clone();
            }
            if overlay.region.is_some() {
                merged.region = overlay.region.clone();
            }
            if overlay.account_id.is_some() {
                merged.account_id = overlay.account_id.clone();
            }
            if overlay.data_store.is_some() {
                merged.data_store = overlay.data_store.clone();
            }
            if overlay.network.is_some() {
                merged.network = overlay.network.clone();
            }
            if overlay.estimated_monthly_cost_usd.is_some() {
                merged.estimated_monthly_cost_usd = overlay.estimated_monthly_cost_usd;
            }
        }

        merged
    }

    /// Reject overlays keyed by anything other than a known environment tier.
    pub fn validate_overlay_keys(&self) -> Result<()> {
        for key in self.environments.keys() {
            if key.parse::<Environment>().is_err() {
                return Err(Error::Configuration(format!(
                    "unknown environment '{key}' in config (expected dev, staging, or prod)"
                )));
            }
        }
        Ok(())
    }

    /// Resolve the effective region: `STRATO_REGION` wins over the config.
    pub fn resolve_region(&self) -> Result<String> {
        if let Ok(region) = std::env::var(REGION_ENV_VAR)
            && !region.is_empty()
        {
            return Ok(region);
        }

        self.region.clone().ok_or_else(|| {
            Error::Configuration(format!(
                "no region configured (set `region:` in {CONFIG_FILENAME} or {REGION_ENV_VAR})"
            ))
        })
    }

    /// Resolve the expected account identifier: `STRATO_ACCOUNT_ID` wins.
    pub fn resolve_expected_account(&self) -> Option<String> {
        if let Ok(account) = std::env::var(ACCOUNT_ENV_VAR)
            && !account.is_empty()
        {
            return Some(account);
        }

        self.account_id.clone()
    }

    pub fn template() -> Self {
        Config {
            stack: StackName::new("my-stack").expect("template stack name is valid"),
            template: Some(PathBuf::from("templates/stack.yml")),
            region: Some("eu-west-1".to_string()),
            account_id: None,
            provider_cli: default_provider_cli(),
            data_store: None,
            network: None,
            estimated_monthly_cost_usd: None,
            poll: PollConfig::default(),
            environments: HashMap::new(),
        }
    }
}

pub fn init_config(dir: &Path, stack: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(s) = stack {
        config.stack = StackName::new(s).map_err(|e| Error::Configuration(e.to_string()))?;
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(config_path)
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"stack: {}
template: templates/stack.yml
region: {}
# account_id: "123456789012"
# data_store: my-stack-db
# network: vpc-mystack
environments:
  dev:
    stack: {}-dev
  staging:
    stack: {}-staging
  prod:
    stack: {}-prod
"#,
        config.stack,
        config.region.as_deref().unwrap_or("eu-west-1"),
        config.stack,
        config.stack,
        config.stack,
    )
}

// Custom deserializers

fn deserialize_stack_name<'de, D>(deserializer: D) -> std::result::Result<StackName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    StackName::new(&s).map_err(serde::de::Error::custom)
}

fn deserialize_stack_name_option<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<StackName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) => StackName::new(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
stack: travel-backend
template: templates/stack.yml
region: eu-west-1
account_id: "123456789012"
data_store: travel-backend-db
environments:
  dev:
    stack: travel-backend-dev
  prod:
    stack: travel-backend-prod
    region: eu-central-1
    estimated_monthly_cost_usd: 800
"#;

    #[test]
    fn parses_sample_config() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.stack.as_str(), "travel-backend");
        assert_eq!(config.provider_cli, "aws");
        assert_eq!(config.poll.interval, Duration::from_secs(30));
        config.validate_overlay_keys().unwrap();
    }

    #[test]
    fn environment_overlay_merges_over_base() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        let prod = config.for_environment(Environment::Prod);
        assert_eq!(prod.stack.as_str(), "travel-backend-prod");
        assert_eq!(prod.region.as_deref(), Some("eu-central-1"));
        assert_eq!(prod.estimated_monthly_cost_usd, Some(800));
        // Untouched fields fall through from the base.
        assert_eq!(prod.account_id.as_deref(), Some("123456789012"));

        let dev = config.for_environment(Environment::Dev);
        assert_eq!(dev.stack.as_str(), "travel-backend-dev");
        assert_eq!(dev.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn staging_without_overlay_uses_base() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let staging = config.for_environment(Environment::Staging);
        assert_eq!(staging.stack.as_str(), "travel-backend");
    }

    #[test]
    fn unknown_overlay_key_is_a_configuration_error() {
        let yaml = r#"
stack: app
region: eu-west-1
environments:
  production:
    stack: app-prod
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.validate_overlay_keys().is_err());
    }

    #[test]
    fn invalid_stack_name_fails_parse() {
        let yaml = "stack: 2bad\nregion: eu-west-1\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn poll_durations_accept_humantime() {
        let yaml = r#"
stack: app
region: eu-west-1
poll:
  interval: 5s
  timeout: 10m
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.poll.timeout, Duration::from_secs(600));
    }
}
