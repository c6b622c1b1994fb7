//! Configuration for fleetstage deployers
//!
//! Build it programmatically, or parse it from YAML.
//!
//! # Example
//!
//! ```
//! use fleetstage::config::DeployConfig;
//! use std::time::Duration;
//!
//! let config = DeployConfig::new()
//!     .hub_context("hub")
//!     .channel("ramen-gitops", "ramen-samples")
//!     .tool_timeout(Duration::from_secs(120));
//!
//! let parsed: DeployConfig = "
//! hubContext: hub
//! channelNamespace: ramen-samples
//! channelName: ramen-gitops
//! toolTimeoutSecs: 120
//! ".parse().unwrap();
//!
//! assert_eq!(config, parsed);
//! ```

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Default namespace of the ArgoCD control plane on the hub
pub const DEFAULT_ARGOCD_NAMESPACE: &str = "argocd";

/// Default OCM cluster set bound into application namespaces
pub const DEFAULT_CLUSTER_SET: &str = "default";

/// Error type for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Deployer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    /// Kubeconfig path; default client resolution when unset
    pub kubeconfig: Option<String>,

    /// Kubeconfig context of the hub cluster
    pub hub_context: Option<String>,

    /// Name of the OCM channel subscriptions pull from
    pub channel_name: String,

    /// Namespace of that channel
    pub channel_namespace: String,

    /// Namespace holding `ApplicationSet`s
    pub argocd_namespace: String,

    /// Cluster set placements select from
    pub cluster_set: String,

    /// Wall-clock bound on each external tool run
    pub tool_timeout: Duration,

    /// External tool binary
    pub kubectl: String,

    /// `requeueAfterSeconds` of the cluster decision generator
    pub requeue_after_seconds: i64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            hub_context: None,
            channel_name: "ramen-gitops".to_string(),
            channel_namespace: "ramen-samples".to_string(),
            argocd_namespace: DEFAULT_ARGOCD_NAMESPACE.to_string(),
            cluster_set: DEFAULT_CLUSTER_SET.to_string(),
            tool_timeout: Duration::from_secs(300),
            kubectl: "kubectl".to_string(),
            requeue_after_seconds: 180,
        }
    }
}

impl DeployConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set kubeconfig path
    #[must_use]
    pub fn kubeconfig(mut self, path: impl Into<String>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Set hub context
    #[must_use]
    pub fn hub_context(mut self, context: impl Into<String>) -> Self {
        self.hub_context = Some(context.into());
        self
    }

    /// Set channel name and namespace
    #[must_use]
    pub fn channel(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self.channel_namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn argocd_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.argocd_namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn cluster_set(mut self, name: impl Into<String>) -> Self {
        self.cluster_set = name.into();
        self
    }

    #[must_use]
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    #[must_use]
    pub fn kubectl(mut self, binary: impl Into<String>) -> Self {
        self.kubectl = binary.into();
        self
    }

    #[must_use]
    pub fn requeue_after_seconds(mut self, seconds: i64) -> Self {
        self.requeue_after_seconds = seconds;
        self
    }

    /// `namespace/name` of the channel, as subscriptions reference it
    pub fn channel_ref(&self) -> String {
        format!("{}/{}", self.channel_namespace, self.channel_name)
    }

    /// Check that every required value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("channelName", &self.channel_name),
            ("channelNamespace", &self.channel_namespace),
            ("argocdNamespace", &self.argocd_namespace),
            ("clusterSet", &self.cluster_set),
            ("kubectl", &self.kubectl),
        ];

        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{field} must not be empty")));
        }

        if self.tool_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "toolTimeoutSecs must be greater than zero".to_string(),
            ));
        }

        if self.requeue_after_seconds <= 0 {
            return Err(ConfigError::Invalid(
                "requeueAfterSeconds must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// On-disk form; every field optional so partial files fall back to defaults
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    kubeconfig: Option<String>,
    hub_context: Option<String>,
    channel_name: Option<String>,
    channel_namespace: Option<String>,
    argocd_namespace: Option<String>,
    cluster_set: Option<String>,
    tool_timeout_secs: Option<u64>,
    kubectl: Option<String>,
    requeue_after_seconds: Option<i64>,
}

impl FromStr for DeployConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawConfig = if s.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(s)?
        };

        let defaults = DeployConfig::default();
        let config = DeployConfig {
            kubeconfig: raw.kubeconfig,
            hub_context: raw.hub_context,
            channel_name: raw.channel_name.unwrap_or(defaults.channel_name),
            channel_namespace: raw.channel_namespace.unwrap_or(defaults.channel_namespace),
            argocd_namespace: raw.argocd_namespace.unwrap_or(defaults.argocd_namespace),
            cluster_set: raw.cluster_set.unwrap_or(defaults.cluster_set),
            tool_timeout: raw
                .tool_timeout_secs
                .map_or(defaults.tool_timeout, Duration::from_secs),
            kubectl: raw.kubectl.unwrap_or(defaults.kubectl),
            requeue_after_seconds: raw
                .requeue_after_seconds
                .unwrap_or(defaults.requeue_after_seconds),
        };

        config.validate()?;
        Ok(config)
    }
}
