//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::qualified_name::QualifiedName;
use crate::reconciler::Timeouts;

/// Default Functions endpoint.
pub const DEFAULT_FUNCTIONS_ENDPOINT: &str = "https://us-south.functions.cloud.ibm.com/api/v1";
/// Default VPC endpoint.
pub const DEFAULT_VPC_ENDPOINT: &str = "https://us-south.iaas.cloud.ibm.com/v1";
/// Default Power Systems endpoint.
pub const DEFAULT_POWER_ENDPOINT: &str = "https://us-south.power-iaas.cloud.ibm.com/pcloud/v1";

const CONFIG_FILE: &str = "converge.toml";

/// Control plane a transport talks to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Service {
    /// Functions namespaces, triggers and actions.
    Functions,
    /// VPC infrastructure (bare-metal servers and their interfaces).
    Vpc,
    /// Power Systems workspaces (cloud connections and jobs).
    Power,
}

/// Session configuration derived from defaults, configuration files,
/// environment variables and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CONVERGE",
    discovery(
        app_name = "converge",
        env_var = "CONVERGE_CONFIG_PATH",
        config_file_name = "converge.toml",
        dotfile_name = ".converge.toml",
        project_file_name = "converge.toml"
    )
)]
pub struct ConvergeConfig {
    /// API key sent as a bearer token and handed to feed actions. Required.
    pub api_key: String,
    /// Functions endpoint.
    #[ortho_config(default = DEFAULT_FUNCTIONS_ENDPOINT.to_owned())]
    pub endpoint: String,
    /// VPC endpoint.
    #[ortho_config(default = DEFAULT_VPC_ENDPOINT.to_owned())]
    pub vpc_endpoint: String,
    /// Power Systems endpoint.
    #[ortho_config(default = DEFAULT_POWER_ENDPOINT.to_owned())]
    pub power_endpoint: String,
    /// Namespace applied to qualified names that carry none.
    #[ortho_config(default = "_".to_owned())]
    pub default_namespace: String,
    /// Power Systems workspace new cloud connections are created in.
    pub cloud_instance_id: Option<String>,
    /// Creation timeout in seconds.
    #[ortho_config(default = 1800)]
    pub create_timeout_secs: u64,
    /// Update timeout in seconds.
    #[ortho_config(default = 1800)]
    pub update_timeout_secs: u64,
    /// Deletion timeout in seconds.
    #[ortho_config(default = 600)]
    pub delete_timeout_secs: u64,
    /// Interval between status polls in seconds.
    #[ortho_config(default = 10)]
    pub poll_interval_secs: u64,
    /// Lower bound on the poll interval in seconds.
    #[ortho_config(default = 10)]
    pub min_timeout_secs: u64,
    /// Wait before the first poll in seconds.
    #[ortho_config(default = 0)]
    pub delay_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to {CONFIG_FILE}",
            self.env_var, self.toml_key
        )
    }
}

impl ConvergeConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "{} must be greater than zero: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("converge")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that provide each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidValue`] for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.api_key,
            &FieldMetadata::new("API key", "CONVERGE_API_KEY", "api_key"),
        )?;
        Self::require_field(
            &self.endpoint,
            &FieldMetadata::new("Functions endpoint", "CONVERGE_ENDPOINT", "endpoint"),
        )?;
        Self::require_field(
            &self.vpc_endpoint,
            &FieldMetadata::new("VPC endpoint", "CONVERGE_VPC_ENDPOINT", "vpc_endpoint"),
        )?;
        Self::require_field(
            &self.power_endpoint,
            &FieldMetadata::new(
                "Power Systems endpoint",
                "CONVERGE_POWER_ENDPOINT",
                "power_endpoint",
            ),
        )?;
        let namespace = FieldMetadata::new(
            "default namespace",
            "CONVERGE_DEFAULT_NAMESPACE",
            "default_namespace",
        );
        Self::require_field(&self.default_namespace, &namespace)?;
        QualifiedName::resolve_with_default("probe", &self.default_namespace).map_err(|err| {
            ConfigError::InvalidValue(format!("{err}: {}", namespace.hint()))
        })?;

        Self::require_positive(
            self.create_timeout_secs,
            &FieldMetadata::new(
                "create timeout",
                "CONVERGE_CREATE_TIMEOUT_SECS",
                "create_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.update_timeout_secs,
            &FieldMetadata::new(
                "update timeout",
                "CONVERGE_UPDATE_TIMEOUT_SECS",
                "update_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.delete_timeout_secs,
            &FieldMetadata::new(
                "delete timeout",
                "CONVERGE_DELETE_TIMEOUT_SECS",
                "delete_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.poll_interval_secs.max(self.min_timeout_secs),
            &FieldMetadata::new(
                "poll interval",
                "CONVERGE_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )
    }

    /// Returns the Power Systems workspace, required by cloud connections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no workspace is configured.
    pub fn require_cloud_instance_id(&self) -> Result<&str, ConfigError> {
        let value = self.cloud_instance_id.as_deref().unwrap_or_default();
        Self::require_field(
            value,
            &FieldMetadata::new(
                "Power Systems workspace",
                "CONVERGE_CLOUD_INSTANCE_ID",
                "cloud_instance_id",
            ),
        )?;
        Ok(value)
    }

    /// Endpoint of `service`.
    #[must_use]
    pub fn endpoint_for(&self, service: Service) -> &str {
        match service {
            Service::Functions => &self.endpoint,
            Service::Vpc => &self.vpc_endpoint,
            Service::Power => &self.power_endpoint,
        }
    }

    /// Wait timings for reconcilers.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(self.create_timeout_secs),
            update: Duration::from_secs(self.update_timeout_secs),
            delete: Duration::from_secs(self.delete_timeout_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_timeout: Duration::from_secs(self.min_timeout_secs),
            delay: Duration::from_secs(self.delay_secs),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds a value that cannot be used.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
