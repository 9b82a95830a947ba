// ABOUTME: Tests for environment-variable overrides in the configuration.
// ABOUTME: Region and account identifier can be injected per process.

use strato::config::{ACCOUNT_ENV_VAR, Config, REGION_ENV_VAR};

const BASE: &str = "stack: demo\nregion: eu-west-1\naccount_id: \"123456789012\"\n";
const NO_REGION: &str = "stack: demo\n";

#[test]
fn region_env_var_wins_over_config() {
    let config = Config::from_yaml(BASE).unwrap();
    temp_env::with_var(REGION_ENV_VAR, Some("us-east-1"), || {
        assert_eq!(config.resolve_region().unwrap(), "us-east-1");
    });
}

#[test]
fn config_region_applies_without_env_var() {
    let config = Config::from_yaml(BASE).unwrap();
    temp_env::with_var(REGION_ENV_VAR, None::<&str>, || {
        assert_eq!(config.resolve_region().unwrap(), "eu-west-1");
    });
}

#[test]
fn missing_region_everywhere_is_an_error() {
    let config = Config::from_yaml(NO_REGION).unwrap();
    temp_env::with_var(REGION_ENV_VAR, None::<&str>, || {
        assert!(config.resolve_region().is_err());
    });
}

#[test]
fn account_env_var_overrides_configured_account() {
    let config = Config::from_yaml(BASE).unwrap();
    temp_env::with_var(ACCOUNT_ENV_VAR, Some("999999999999"), || {
        assert_eq!(
            config.resolve_expected_account().as_deref(),
            Some("999999999999")
        );
    });
}

#[test]
fn configured_account_applies_without_env_var() {
    let config = Config::from_yaml(BASE).unwrap();
    temp_env::with_var(ACCOUNT_ENV_VAR, None::<&str>, || {
        assert_eq!(
            config.resolve_expected_account().as_deref(),
            Some("123456789012")
        );
    });
}
