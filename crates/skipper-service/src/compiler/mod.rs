//! Service composer for skipper
//!
//! Turns one `ServiceSpec` into one `ServiceDescriptor`: the task's identity,
//! its isolation boundary, its secret bindings, the task itself and the
//! rollout policy, ready to hand to the orchestrator.
//!
//! # Architecture
//!
//! The composer delegates to the component resolvers in dependency order:
//! - [`IdentityResolver`] and [`IsolationResolver`]: independent
//! - [`SecretBindingResolver`]: widens the identity with secret reads
//! - [`TaskDescriptorBuilder`]: needs all three
//! - [`DeploymentPolicy::select`]: independent, applied last
//!
//! The network and secret lookups are the only I/O and run concurrently.
//! Any error aborts the whole compose; nothing partial is returned.
//!
//! # Usage
//!
//! ```text
//! let composer = ServiceComposer::new(secrets, networks)
//!     .with_strategy(DeploymentStrategy::default());
//! let descriptor = composer.compose(&spec).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::deployment::DeploymentPolicy;
use crate::identity::IdentityResolver;
use crate::lookup::{NetworkCatalog, SecretStore, DEFAULT_LOOKUP_TIMEOUT};
use crate::network::{IsolationBoundary, IsolationResolver};
use crate::runtime::RuntimeDefaults;
use crate::secrets::SecretBindingResolver;
use crate::spec::{DeploymentStrategy, ServiceSpec};
use crate::task::{CommandTemplate, TaskDescriptor, TaskDescriptorBuilder};
use crate::Result;

/// Complete output of one compose
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    /// Cluster the service is submitted to
    pub cluster: String,
    /// Service name
    pub service_name: String,
    /// Task specification, including its role
    pub task: TaskDescriptor,
    /// Isolation boundary the tasks run in
    pub isolation: IsolationBoundary,
    /// Rollout policy
    pub deployment: DeploymentPolicy,
    /// Whether tasks get a public address; always false
    pub assign_public_ip: bool,
}

impl ServiceDescriptor {
    /// Number of orchestrator resources this descriptor stands for
    ///
    /// Role, isolation group, task definition, log group and the service
    /// itself.
    pub fn resource_count(&self) -> usize {
        5
    }

    /// One-line summary for logs and CI output
    pub fn summary(&self) -> String {
        format!(
            "{}: {} resources on {} (task {}, {} secrets, {} subnets, strategy {})",
            self.service_name,
            self.resource_count(),
            self.cluster,
            self.task.family(),
            self.task.secrets().len(),
            self.isolation.subnets.len(),
            self.deployment.strategy,
        )
    }
}

/// Composes service descriptors from specs
///
/// Holds no per-service state; one composer can compile any number of specs,
/// concurrently if the caller wishes.
pub struct ServiceComposer {
    secrets: Arc<dyn SecretStore>,
    networks: Arc<dyn NetworkCatalog>,
    defaults: RuntimeDefaults,
    template: CommandTemplate,
    strategy: DeploymentStrategy,
    lookup_timeout: Duration,
}

impl ServiceComposer {
    /// Create a composer over the given collaborators
    ///
    /// Starts from the `bsc-hermes` runtime defaults, the price pusher
    /// command template, `singleton-replace` and a 10s lookup bound.
    pub fn new(secrets: Arc<dyn SecretStore>, networks: Arc<dyn NetworkCatalog>) -> Self {
        Self {
            secrets,
            networks,
            defaults: RuntimeDefaults::default(),
            template: CommandTemplate::default(),
            strategy: DeploymentStrategy::default(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Use a different runtime defaults record
    pub fn with_defaults(mut self, defaults: RuntimeDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Use a different command template
    pub fn with_template(mut self, template: CommandTemplate) -> Self {
        self.template = template;
        self
    }

    /// Use a different deployment strategy
    pub fn with_strategy(mut self, strategy: DeploymentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Bound each collaborator lookup by `timeout`
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Compile `spec` into a service descriptor
    ///
    /// # Errors
    ///
    /// Any component error, unchanged. When the network and the secrets both
    /// fail, the network error is reported.
    #[instrument(skip(self, spec), fields(service = %spec.name, cluster = %spec.cluster))]
    pub async fn compose(&self, spec: &ServiceSpec) -> Result<ServiceDescriptor> {
        spec.validate()?;

        let identity = IdentityResolver::resolve(&spec.name, &spec.policies)?;
        debug!(grants = identity.grants().len(), "resolved identity");

        let locator = spec.secret_locator();
        let secret_resolver = SecretBindingResolver::new(self.secrets.as_ref(), self.lookup_timeout);
        let (network, resolved) = tokio::join!(
            IsolationResolver::lookup(
                self.networks.as_ref(),
                &spec.name,
                &spec.network,
                self.lookup_timeout,
            ),
            secret_resolver.resolve(identity, &locator, &spec.secrets),
        );
        let network = network?;
        let resolved = resolved?;
        debug!(bindings = resolved.bindings.len(), "resolved secret bindings");

        let isolation = IsolationResolver::resolve(&spec.name, &network)?;
        debug!(boundary = %isolation.name, subnets = isolation.subnets.len(), "resolved isolation boundary");

        let task = TaskDescriptorBuilder::new(&self.defaults, &self.template).build(
            spec,
            resolved.identity,
            resolved.bindings,
        )?;

        let deployment = DeploymentPolicy::select(&self.strategy)?;

        let descriptor = ServiceDescriptor {
            cluster: spec.cluster.clone(),
            service_name: spec.name.clone(),
            task,
            isolation,
            deployment,
            assign_public_ip: false,
        };
        info!(summary = %descriptor.summary(), "composed service descriptor");
        Ok(descriptor)
    }
}

// =============================================================================
// Tests
// =============================================================================
