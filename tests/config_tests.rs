//! Unit tests for configuration loading and validation.

use std::time::Duration;

use converge::config::{
    ConfigError, DEFAULT_FUNCTIONS_ENDPOINT, DEFAULT_POWER_ENDPOINT, DEFAULT_VPC_ENDPOINT, Service,
};
use converge::test_support::EnvGuard;
use converge::{ConvergeConfig, Timeouts};
use rstest::*;
use tempfile::TempDir;

const MANAGED_VARS: &[&str] = &[
    "CONVERGE_ENDPOINT",
    "CONVERGE_VPC_ENDPOINT",
    "CONVERGE_POWER_ENDPOINT",
    "CONVERGE_DEFAULT_NAMESPACE",
    "CONVERGE_CLOUD_INSTANCE_ID",
    "CONVERGE_CREATE_TIMEOUT_SECS",
    "CONVERGE_UPDATE_TIMEOUT_SECS",
    "CONVERGE_DELETE_TIMEOUT_SECS",
    "CONVERGE_POLL_INTERVAL_SECS",
    "CONVERGE_MIN_TIMEOUT_SECS",
    "CONVERGE_DELAY_SECS",
];

#[fixture]
fn valid_config() -> ConvergeConfig {
    ConvergeConfig {
        api_key: String::from("uuid:secret"),
        endpoint: String::from(DEFAULT_FUNCTIONS_ENDPOINT),
        vpc_endpoint: String::from(DEFAULT_VPC_ENDPOINT),
        power_endpoint: String::from(DEFAULT_POWER_ENDPOINT),
        default_namespace: String::from("_"),
        cloud_instance_id: None,
        create_timeout_secs: 1800,
        update_timeout_secs: 1800,
        delete_timeout_secs: 600,
        poll_interval_secs: 10,
        min_timeout_secs: 10,
        delay_secs: 0,
    }
}

#[rstest]
fn valid_config_passes_validation(valid_config: ConvergeConfig) {
    valid_config
        .validate()
        .unwrap_or_else(|err| panic!("valid config should validate: {err}"));
}

#[rstest]
fn missing_api_key_is_actionable(valid_config: ConvergeConfig) {
    let cfg = ConvergeConfig {
        api_key: String::from("  "),
        ..valid_config
    };

    let error = cfg.validate().expect_err("api key is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };
    assert!(
        message.contains("CONVERGE_API_KEY"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("converge.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains("api_key"),
        "error should mention TOML key: {message}"
    );
}

/// Every required field names the environment variable and configuration key
/// that provide it.
#[rstest]
#[case::endpoint(|cfg: &mut ConvergeConfig| cfg.endpoint.clear(), "CONVERGE_ENDPOINT", "endpoint")]
#[case::vpc(|cfg: &mut ConvergeConfig| cfg.vpc_endpoint.clear(), "CONVERGE_VPC_ENDPOINT", "vpc_endpoint")]
#[case::power(|cfg: &mut ConvergeConfig| cfg.power_endpoint.clear(), "CONVERGE_POWER_ENDPOINT", "power_endpoint")]
#[case::namespace(|cfg: &mut ConvergeConfig| cfg.default_namespace.clear(), "CONVERGE_DEFAULT_NAMESPACE", "default_namespace")]
#[case::create(|cfg: &mut ConvergeConfig| cfg.create_timeout_secs = 0, "CONVERGE_CREATE_TIMEOUT_SECS", "create_timeout_secs")]
#[case::delete(|cfg: &mut ConvergeConfig| cfg.delete_timeout_secs = 0, "CONVERGE_DELETE_TIMEOUT_SECS", "delete_timeout_secs")]
fn validation_errors_are_actionable(
    valid_config: ConvergeConfig,
    #[case] mutate: fn(&mut ConvergeConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);

    let message = cfg
        .validate()
        .expect_err("validation should fail")
        .to_string();

    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
fn namespace_with_separator_is_invalid(valid_config: ConvergeConfig) {
    let cfg = ConvergeConfig {
        default_namespace: String::from("team/extra"),
        ..valid_config
    };

    let error = cfg.validate().expect_err("namespace must be one segment");

    assert!(matches!(error, ConfigError::InvalidValue(_)), "got {error:?}");
}

#[rstest]
fn zero_poll_interval_is_accepted_when_floor_is_positive(valid_config: ConvergeConfig) {
    let cfg = ConvergeConfig {
        poll_interval_secs: 0,
        min_timeout_secs: 5,
        ..valid_config
    };

    assert!(cfg.validate().is_ok());
}

#[rstest]
fn timeouts_convert_seconds(valid_config: ConvergeConfig) {
    let cfg = ConvergeConfig {
        create_timeout_secs: 120,
        delay_secs: 3,
        ..valid_config
    };

    assert_eq!(
        cfg.timeouts(),
        Timeouts {
            create: Duration::from_secs(120),
            update: Duration::from_secs(1800),
            delete: Duration::from_secs(600),
            poll_interval: Duration::from_secs(10),
            min_timeout: Duration::from_secs(10),
            delay: Duration::from_secs(3),
        }
    );
}

#[rstest]
fn endpoints_are_selected_per_service(valid_config: ConvergeConfig) {
    assert_eq!(
        valid_config.endpoint_for(Service::Functions),
        DEFAULT_FUNCTIONS_ENDPOINT
    );
    assert_eq!(valid_config.endpoint_for(Service::Vpc), DEFAULT_VPC_ENDPOINT);
    assert_eq!(
        valid_config.endpoint_for(Service::Power),
        DEFAULT_POWER_ENDPOINT
    );
}

#[rstest]
fn cloud_connections_require_a_workspace(valid_config: ConvergeConfig) {
    let error = valid_config
        .require_cloud_instance_id()
        .expect_err("workspace is not configured");
    assert!(
        error.to_string().contains("CONVERGE_CLOUD_INSTANCE_ID"),
        "unexpected error: {error}"
    );

    let cfg = ConvergeConfig {
        cloud_instance_id: Some(String::from("ci-9")),
        ..valid_config
    };
    assert_eq!(cfg.require_cloud_instance_id(), Ok("ci-9"));
}

#[tokio::test]
async fn environment_overrides_defaults() {
    let _guard = EnvGuard::apply(
        &[
            ("CONVERGE_API_KEY", "env-key"),
            ("CONVERGE_DEFAULT_NAMESPACE", "team"),
            ("CONVERGE_DELETE_TIMEOUT_SECS", "30"),
        ],
        &["CONVERGE_CONFIG_PATH", "CONVERGE_ENDPOINT", "CONVERGE_POLL_INTERVAL_SECS"],
    )
    .await;

    let cfg = ConvergeConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config should load: {err}"));

    assert_eq!(cfg.api_key, "env-key");
    assert_eq!(cfg.default_namespace, "team");
    assert_eq!(cfg.delete_timeout_secs, 30);
    assert_eq!(cfg.endpoint, DEFAULT_FUNCTIONS_ENDPOINT);
    assert_eq!(cfg.poll_interval_secs, 10);
}

#[tokio::test]
async fn configuration_file_supplies_values() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = tmp.path().join("converge.toml");
    std::fs::write(
        &path,
        "api_key = \"file-key\"\ncloud_instance_id = \"ci-9\"\npoll_interval_secs = 5\n",
    )
    .unwrap_or_else(|err| panic!("write config file: {err}"));
    let path_str = path
        .to_str()
        .unwrap_or_else(|| panic!("temp path should be utf8: {}", path.display()))
        .to_owned();
    let mut removed: Vec<&str> = MANAGED_VARS.to_vec();
    removed.push("CONVERGE_API_KEY");
    let _guard = EnvGuard::apply(&[("CONVERGE_CONFIG_PATH", path_str.as_str())], &removed).await;

    let cfg = ConvergeConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config should load: {err}"));

    assert_eq!(cfg.api_key, "file-key");
    assert_eq!(cfg.cloud_instance_id.as_deref(), Some("ci-9"));
    assert_eq!(cfg.poll_interval_secs, 5);
    assert_eq!(cfg.default_namespace, "_");
}
