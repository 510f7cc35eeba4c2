//! Task descriptor construction
//!
//! A task descriptor is the immutable spec of the single container the
//! service runs: image, sizing, environment, secret bindings, startup command
//! and log settings. A change to any input produces a new descriptor; nothing
//! here is patched in place.

pub mod command;
pub mod sizing;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::identity::Identity;
use crate::runtime::RuntimeDefaults;
use crate::secrets::SecretBinding;
use crate::spec::{ComputeSizing, ImageSource, ServiceSpec};
use crate::{Error, Result};

pub use command::{CommandTemplate, FlagMapping, FlagSource};
pub use sizing::{ensure_supported, is_supported, MemoryOptions, SIZING_TIERS};

/// Network mode every task runs with (one interface per task)
pub const TASK_NETWORK_MODE: &str = "awsvpc";

/// Log driver the container writes through
pub const LOG_DRIVER: &str = "awslogs";

/// Log sink configuration for the container
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// Log driver
    pub driver: String,
    /// Stream prefix
    pub stream_prefix: String,
    /// Retention, days
    pub retention_days: u32,
}

/// Immutable specification of the service's task
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    family: String,
    container_name: String,
    image: ImageSource,
    sizing: ComputeSizing,
    network_mode: String,
    memory_limit_mib: u32,
    task_role: Identity,
    environment: BTreeMap<String, String>,
    secrets: Vec<SecretBinding>,
    command: Vec<String>,
    logging: LogConfig,
    essential: bool,
    runtime_profile: String,
}

impl TaskDescriptor {
    /// Task family, equal to the service name
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Container name (`<service>-backend`)
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Image source
    pub fn image(&self) -> &ImageSource {
        &self.image
    }

    /// CPU and memory
    pub fn sizing(&self) -> ComputeSizing {
        self.sizing
    }

    /// Network mode
    pub fn network_mode(&self) -> &str {
        &self.network_mode
    }

    /// Hard memory limit of the container, MiB
    pub fn memory_limit_mib(&self) -> u32 {
        self.memory_limit_mib
    }

    /// Role the task runs under
    pub fn task_role(&self) -> &Identity {
        &self.task_role
    }

    /// Plain environment, defaults overlaid by caller overrides
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Secret bindings in declaration order
    pub fn secrets(&self) -> &[SecretBinding] {
        &self.secrets
    }

    /// Startup argv
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Log settings
    pub fn logging(&self) -> &LogConfig {
        &self.logging
    }

    /// Whether the task stops when this container stops; always true
    pub fn essential(&self) -> bool {
        self.essential
    }

    /// Name of the runtime defaults record the environment started from
    pub fn runtime_profile(&self) -> &str {
        &self.runtime_profile
    }
}

/// Builds task descriptors from a spec and its resolved pieces
pub struct TaskDescriptorBuilder<'a> {
    defaults: &'a RuntimeDefaults,
    template: &'a CommandTemplate,
}

impl<'a> TaskDescriptorBuilder<'a> {
    /// Create a builder with explicit runtime defaults and command template
    pub fn new(defaults: &'a RuntimeDefaults, template: &'a CommandTemplate) -> Self {
        Self { defaults, template }
    }

    /// Build the task descriptor for `spec`
    ///
    /// # Errors
    ///
    /// - `Error::UnsupportedSizing` if the (CPU, memory) pair is not schedulable
    /// - `Error::Validation` if a secret binding would shadow a plain
    ///   environment variable, or the command template is malformed
    pub fn build(
        &self,
        spec: &ServiceSpec,
        identity: Identity,
        bindings: Vec<SecretBinding>,
    ) -> Result<TaskDescriptor> {
        ensure_supported(&spec.name, spec.sizing)?;
        self.template.validate()?;

        let mut environment = self.defaults.to_environment();
        environment.extend(
            spec.environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        if let Some(binding) = bindings.iter().find(|b| environment.contains_key(&b.env)) {
            return Err(Error::validation_for_field(
                &spec.name,
                format!("secrets.{}", binding.env),
                "secret would shadow a plain environment variable of the same name",
            ));
        }

        let command = self.template.render(&environment, &bindings);
        debug!(
            service = %spec.name,
            profile = %self.defaults.name,
            env = environment.len(),
            secrets = bindings.len(),
            "built task descriptor"
        );

        Ok(TaskDescriptor {
            family: spec.name.clone(),
            container_name: format!("{}-backend", spec.name),
            image: spec.image_source(),
            sizing: spec.sizing,
            network_mode: TASK_NETWORK_MODE.to_string(),
            memory_limit_mib: spec.sizing.memory_mib,
            task_role: identity,
            environment,
            secrets: bindings,
            command,
            logging: LogConfig {
                driver: LOG_DRIVER.to_string(),
                stream_prefix: spec.log_stream_prefix().to_string(),
                retention_days: spec.logging.retention_days,
            },
            essential: true,
            runtime_profile: self.defaults.name.clone(),
        })
    }
}
