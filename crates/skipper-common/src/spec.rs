//! Input types for a single service compile
//!
//! `ServiceSpec` is the caller-supplied description of one backend worker.
//! It is deserialized once per invocation and never mutated afterwards; the
//! compiler derives everything else from it.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Suffix of the per-service secret locator (`<service>/config`)
pub const SECRET_LOCATOR_SUFFIX: &str = "config";

/// Default log retention in days
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 3;

/// Retention periods the log sink accepts, in days
pub const SUPPORTED_LOG_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1827, 3653,
];

const MAX_SERVICE_NAME_LEN: usize = 63;

// =============================================================================
// ServiceSpec
// =============================================================================

/// Top-level description of one service to compile
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceSpec {
    /// Unique, human-readable service name (DNS label)
    pub name: String,

    /// Cluster the service is submitted to
    pub cluster: String,

    /// Network the service's tasks are placed in
    pub network: String,

    /// Container environment overrides; these win over runtime defaults
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Secret field names the container needs, in declaration order
    #[serde(default)]
    pub secrets: Vec<String>,

    /// Extra permission fragments for the task identity, in merge order
    #[serde(default)]
    pub policies: Vec<PolicyFragment>,

    /// Compute sizing for the task
    #[serde(default)]
    pub sizing: ComputeSizing,

    /// Where the container image comes from; defaults to a local build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSource>,

    /// Log sink configuration
    #[serde(default)]
    pub logging: LogSpec,
}

impl ServiceSpec {
    /// Locator of this service's entry in the secret store
    pub fn secret_locator(&self) -> String {
        format!("{}/{}", self.name, SECRET_LOCATOR_SUFFIX)
    }

    /// Image source, falling back to a build of the current directory
    pub fn image_source(&self) -> ImageSource {
        self.image
            .clone()
            .unwrap_or_else(|| ImageSource::default_build(&self.name))
    }

    /// Log stream prefix, falling back to the service name
    pub fn log_stream_prefix(&self) -> &str {
        self.logging
            .stream_prefix
            .as_deref()
            .unwrap_or(self.name.as_str())
    }

    /// Validate shape constraints that don't need any external lookup
    ///
    /// Sizing is checked later against the orchestrator's table; this only
    /// covers names, keys, and duplicates.
    pub fn validate(&self) -> Result<()> {
        if !is_dns_label(&self.name) {
            return Err(Error::validation_for_field(
                &self.name,
                "name",
                format!(
                    "must be 1-{MAX_SERVICE_NAME_LEN} lowercase alphanumeric characters or '-', \
                     starting with a letter and not ending with '-'"
                ),
            ));
        }
        if self.cluster.trim().is_empty() {
            return Err(Error::validation_for_field(&self.name, "cluster", "must not be empty"));
        }
        if self.network.trim().is_empty() {
            return Err(Error::validation_for_field(&self.name, "network", "must not be empty"));
        }

        for key in self.environment.keys() {
            if !is_shell_identifier(key) {
                return Err(Error::validation_for_field(
                    &self.name,
                    format!("environment.{key}"),
                    "environment keys must be shell identifiers ([A-Za-z_][A-Za-z0-9_]*)",
                ));
            }
        }

        let mut seen = BTreeSet::new();
        let mut materialized = BTreeSet::new();
        for secret in &self.secrets {
            if !is_shell_identifier(secret) {
                return Err(Error::validation_for_field(
                    &self.name,
                    format!("secrets.{secret}"),
                    "secret names must be shell identifiers ([A-Za-z_][A-Za-z0-9_]*)",
                ));
            }
            if !seen.insert(secret.as_str()) {
                return Err(Error::validation_for_field(
                    &self.name,
                    format!("secrets.{secret}"),
                    "secret listed more than once",
                ));
            }
            // Each secret is written to `./<name lowercased>` before the worker starts.
            if !materialized.insert(secret.to_ascii_lowercase()) {
                return Err(Error::validation_for_field(
                    &self.name,
                    format!("secrets.{secret}"),
                    "secret names must differ in more than letter case",
                ));
            }
            if self.environment.contains_key(secret) {
                return Err(Error::validation_for_field(
                    &self.name,
                    format!("secrets.{secret}"),
                    "name is also set as a plain environment variable",
                ));
            }
        }

        if let Some(prefix) = &self.logging.stream_prefix {
            if prefix.trim().is_empty() {
                return Err(Error::validation_for_field(
                    &self.name,
                    "logging.streamPrefix",
                    "must not be empty",
                ));
            }
        }

        for (index, fragment) in self.policies.iter().enumerate() {
            if fragment.name.trim().is_empty() {
                return Err(Error::validation_for_field(
                    &self.name,
                    format!("policies[{index}].name"),
                    "must not be empty",
                ));
            }
        }

        if !SUPPORTED_LOG_RETENTION_DAYS.contains(&self.logging.retention_days) {
            return Err(Error::validation_for_field(
                &self.name,
                "logging.retentionDays",
                format!(
                    "{} days is not a supported retention period",
                    self.logging.retention_days
                ),
            ));
        }

        Ok(())
    }
}

/// Lowercase DNS label: `[a-z]([a-z0-9-]*[a-z0-9])?`, at most 63 chars
pub fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            s.len() <= MAX_SERVICE_NAME_LEN
                && first.is_ascii_lowercase()
                && *last != b'-'
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_shell_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

// =============================================================================
// Policy fragments
// =============================================================================

/// Whether a policy statement grants or denies
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    /// Grants the listed actions
    Allow,
    /// Explicitly denies the listed actions
    Deny,
}

impl std::fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        })
    }
}

/// A named permission statement for the task identity
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyFragment {
    /// Merge key
    pub name: String,
    /// Allow or deny
    pub effect: PolicyEffect,
    /// Actions covered (e.g. "s3:GetObject")
    #[serde(default)]
    pub actions: Vec<String>,
    /// Resources covered; "*" for all
    #[serde(default)]
    pub resources: Vec<String>,
}

impl PolicyFragment {
    /// Create an allow fragment
    pub fn allow<A, R>(name: impl Into<String>, actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            name: name.into(),
            effect: PolicyEffect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a deny fragment
    pub fn deny<A, R>(name: impl Into<String>, actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: PolicyEffect::Deny,
            ..Self::allow(name, actions, resources)
        }
    }
}

// =============================================================================
// Compute sizing
// =============================================================================

/// CPU units (1024 = one vCPU) and memory for one task
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComputeSizing {
    /// CPU units
    pub cpu: u32,
    /// Memory in MiB
    pub memory_mib: u32,
}

impl Default for ComputeSizing {
    fn default() -> Self {
        Self {
            cpu: 1024,
            memory_mib: 2048,
        }
    }
}

// =============================================================================
// Image source
// =============================================================================

/// Dockerfile used when no image source is given
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile.cdk";

/// Build argument carrying the service name into the default build
pub const SERVICE_BUILD_ARG: &str = "SERVICE";

/// Where the task's container image comes from
///
/// The compiler only records the source. Building and pushing is the image
/// builder's job at submission time.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ImageSource {
    /// A prebuilt image already in a registry
    Registry {
        /// Full image reference (e.g. "ghcr.io/org/pusher:1.2.0")
        reference: String,
    },
    /// An image to be built from a local context
    Build(ImageBuild),
}

/// Build context for an image the external builder produces
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageBuild {
    /// Build context directory
    pub context: String,
    /// Dockerfile path relative to the context
    pub dockerfile: String,
    /// Build arguments
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

impl ImageSource {
    /// Build of `./` with the default Dockerfile and `SERVICE=<service>`
    pub fn default_build(service_name: &str) -> Self {
        let mut build_args = BTreeMap::new();
        build_args.insert(SERVICE_BUILD_ARG.to_string(), service_name.to_string());
        Self::Build(ImageBuild {
            context: "./".to_string(),
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
            build_args,
        })
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log sink settings for the task's container
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LogSpec {
    /// Stream prefix; defaults to the service name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_prefix: Option<String>,
    /// Retention in days; must be a value the sink supports
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    DEFAULT_LOG_RETENTION_DAYS
}

impl Default for LogSpec {
    fn default() -> Self {
        Self {
            stream_prefix: None,
            retention_days: DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

// =============================================================================
// Deployment strategy
// =============================================================================

/// Rollout strategy requested for the service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeploymentStrategy {
    /// At most one instance; replace in place, no automatic rollback
    #[default]
    SingletonReplace,
    /// Multi-replica rolling update with rollback
    Rolling(RollingParams),
}

impl DeploymentStrategy {
    /// Strategy name as written in config
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingletonReplace => "singleton-replace",
            Self::Rolling(_) => "rolling",
        }
    }
}

/// Parameters for the `rolling` strategy
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RollingParams {
    /// Desired running task count
    #[serde(default = "default_rolling_desired")]
    pub desired_count: u32,
    /// Lower bound on healthy tasks during rollout, percent of desired
    #[serde(default = "default_rolling_min")]
    pub min_healthy_percent: u32,
    /// Upper bound on running tasks during rollout, percent of desired
    #[serde(default = "default_rolling_max")]
    pub max_healthy_percent: u32,
}

fn default_rolling_desired() -> u32 {
    2
}

fn default_rolling_min() -> u32 {
    50
}

fn default_rolling_max() -> u32 {
    200
}

impl Default for RollingParams {
    fn default() -> Self {
        Self {
            desired_count: default_rolling_desired(),
            min_healthy_percent: default_rolling_min(),
            max_healthy_percent: default_rolling_max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_spec() -> ServiceSpec {
        ServiceSpec {
            name: "price-pusher".to_string(),
            cluster: "backend".to_string(),
            network: "vpc-main".to_string(),
            environment: BTreeMap::new(),
            secrets: vec!["MNEMONIC".to_string()],
            policies: vec![],
            sizing: ComputeSizing::default(),
            image: None,
            logging: LogSpec::default(),
        }
    }

    // =========================================================================
    // Story: Deserializing a ServiceSpec
    // =========================================================================

    #[test]
    fn story_minimal_spec_gets_defaults() {
        let spec: ServiceSpec = serde_json::from_value(serde_json::json!({
            "name": "price-pusher",
            "cluster": "backend",
            "network": "vpc-main",
        }))
        .unwrap();

        assert_eq!(spec.sizing, ComputeSizing { cpu: 1024, memory_mib: 2048 });
        assert_eq!(spec.logging.retention_days, 3);
        assert!(spec.secrets.is_empty());
        assert!(spec.image.is_none());
    }

    #[test]
    fn story_unknown_fields_are_rejected() {
        let result: std::result::Result<ServiceSpec, _> = serde_json::from_value(serde_json::json!({
            "name": "price-pusher",
            "cluster": "backend",
            "network": "vpc-main",
            "replicas": 3,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn story_policy_fragment_effect_is_lowercase() {
        let fragment: PolicyFragment = serde_json::from_value(serde_json::json!({
            "name": "secrets-read",
            "effect": "deny",
            "actions": ["secretsmanager:GetSecretValue"],
            "resources": ["*"],
        }))
        .unwrap();
        assert_eq!(fragment.effect, PolicyEffect::Deny);
    }

    #[test]
    fn story_image_sources() {
        let registry: ImageSource =
            serde_json::from_value(serde_json::json!({"registry": {"reference": "ghcr.io/x/y:1"}}))
                .unwrap();
        assert_eq!(
            registry,
            ImageSource::Registry {
                reference: "ghcr.io/x/y:1".to_string()
            }
        );

        let build: ImageSource = serde_json::from_value(serde_json::json!({
            "build": {"context": "./worker", "dockerfile": "Dockerfile", "buildArgs": {"A": "1"}}
        }))
        .unwrap();
        match build {
            ImageSource::Build(b) => assert_eq!(b.build_args.get("A"), Some(&"1".to_string())),
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn story_deployment_strategy_tags() {
        let singleton: DeploymentStrategy =
            serde_json::from_value(serde_json::json!({"type": "singleton-replace"})).unwrap();
        assert_eq!(singleton, DeploymentStrategy::SingletonReplace);

        let rolling: DeploymentStrategy = serde_json::from_value(serde_json::json!({
            "type": "rolling",
            "minHealthyPercent": 75,
        }))
        .unwrap();
        assert_eq!(
            rolling,
            DeploymentStrategy::Rolling(RollingParams {
                desired_count: 2,
                min_healthy_percent: 75,
                max_healthy_percent: 200,
            })
        );
        assert_eq!(rolling.as_str(), "rolling");
    }

    // =========================================================================
    // Story: Derived values
    // =========================================================================

    #[test]
    fn story_secret_locator_follows_convention() {
        assert_eq!(sample_spec().secret_locator(), "price-pusher/config");
    }

    #[test]
    fn story_default_image_is_local_build() {
        match sample_spec().image_source() {
            ImageSource::Build(build) => {
                assert_eq!(build.context, "./");
                assert_eq!(build.dockerfile, DEFAULT_DOCKERFILE);
                assert_eq!(
                    build.build_args.get(SERVICE_BUILD_ARG),
                    Some(&"price-pusher".to_string())
                );
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn story_stream_prefix_defaults_to_name() {
        let mut spec = sample_spec();
        assert_eq!(spec.log_stream_prefix(), "price-pusher");
        spec.logging.stream_prefix = Some("hypurr-price-pusher".to_string());
        assert_eq!(spec.log_stream_prefix(), "hypurr-price-pusher");
    }

    // =========================================================================
    // Story: Validation
    // =========================================================================

    #[test]
    fn story_valid_spec_passes() {
        assert!(sample_spec().validate().is_ok());
    }

    #[rstest]
    #[case::empty("")]
    #[case::uppercase("Price-Pusher")]
    #[case::leading_digit("1pusher")]
    #[case::trailing_dash("pusher-")]
    #[case::underscore("price_pusher")]
    fn story_bad_service_names_rejected(#[case] name: &str) {
        let mut spec = sample_spec();
        spec.name = name.to_string();
        let err = spec.validate().unwrap_err();
        assert_eq!(err.kind(), "Validation");
    }

    #[test]
    fn story_env_keys_must_be_shell_identifiers() {
        let mut spec = sample_spec();
        spec.environment
            .insert("BAD-KEY".to_string(), "x".to_string());
        match spec.validate().unwrap_err() {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("environment.BAD-KEY"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn story_duplicate_secret_rejected() {
        let mut spec = sample_spec();
        spec.secrets.push("MNEMONIC".to_string());
        assert!(spec
            .validate()
            .unwrap_err()
            .to_string()
            .contains("more than once"));
    }

    #[test]
    fn story_secrets_differing_only_in_case_rejected() {
        let mut spec = sample_spec();
        spec.secrets.push("mnemonic".to_string());
        match spec.validate().unwrap_err() {
            Error::Validation { field, message, .. } => {
                assert_eq!(field.as_deref(), Some("secrets.mnemonic"));
                assert!(message.contains("letter case"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn story_empty_stream_prefix_rejected() {
        let mut spec = sample_spec();
        spec.logging.stream_prefix = Some(String::new());
        match spec.validate().unwrap_err() {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("logging.streamPrefix"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn story_secret_shadowing_env_rejected() {
        let mut spec = sample_spec();
        spec.environment
            .insert("MNEMONIC".to_string(), "plain".to_string());
        assert!(spec.validate().is_err());
    }

    #[test]
    fn story_unsupported_retention_rejected() {
        let mut spec = sample_spec();
        spec.logging.retention_days = 4;
        assert!(spec.validate().unwrap_err().to_string().contains("4 days"));
    }

    #[test]
    fn story_empty_cluster_rejected() {
        let mut spec = sample_spec();
        spec.cluster = "  ".to_string();
        assert!(spec.validate().is_err());
    }

    #[rstest]
    #[case("ENDPOINT", true)]
    #[case("_private", true)]
    #[case("A1", true)]
    #[case("1A", false)]
    #[case("A-B", false)]
    #[case("", false)]
    fn story_shell_identifier(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_shell_identifier(input), expected);
    }
}
