//! External collaborators the compiler reads from
//!
//! The compiler never fetches secret values and never talks to the
//! orchestrator. It performs two kinds of read-only lookups: whether a secret
//! field exists in the store, and which subnets a network offers. Both are
//! traits so the CLI can back them with an inventory file and tests can mock
//! them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};

#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

/// Collaborator label used in secret store errors
pub const SECRET_STORE: &str = "secret-store";

/// Collaborator label used in network catalog errors
pub const NETWORK_CATALOG: &str = "network-catalog";

/// Default bound on a single collaborator lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Secret store
// =============================================================================

/// Pointer to one field of a secret held by the external store
///
/// Carries no value. The orchestrator resolves it when the task starts.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecretReference {
    /// Store-side identifier of the secret (a name or an ARN)
    pub store_id: String,
    /// Field inside that secret
    pub field: String,
}

impl SecretReference {
    /// Create a reference
    pub fn new(store_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.store_id, self.field)
    }
}

impl Serialize for SecretReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Trait abstracting the external secret store
///
/// Only existence of a field is checked; values never cross this boundary.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Look up `field` inside the secret at `locator`
    ///
    /// Returns `Ok(None)` when the secret or the field does not exist.
    async fn lookup(&self, locator: &str, field: &str) -> Result<Option<SecretReference>>;
}

/// One secret known to an [`InMemorySecretStore`]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoredSecret {
    /// Store-side identifier; defaults to the locator itself
    #[serde(default)]
    pub store_id: Option<String>,
    /// Field names present in the secret
    #[serde(default)]
    pub fields: BTreeSet<String>,
}

/// Secret store backed by a fixed table of locators and field names
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct InMemorySecretStore {
    secrets: BTreeMap<String, StoredSecret>,
}

impl InMemorySecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret whose store id equals its locator
    pub fn with_secret<I, S>(mut self, locator: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets.insert(
            locator.into(),
            StoredSecret {
                store_id: None,
                fields: fields.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Add a secret with an explicit store id
    pub fn with_secret_id<I, S>(
        mut self,
        locator: impl Into<String>,
        store_id: impl Into<String>,
        fields: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets.insert(
            locator.into(),
            StoredSecret {
                store_id: Some(store_id.into()),
                fields: fields.into_iter().map(Into::into).collect(),
            },
        );
        self
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn lookup(&self, locator: &str, field: &str) -> Result<Option<SecretReference>> {
        Ok(self.secrets.get(locator).and_then(|secret| {
            secret.fields.contains(field).then(|| {
                let store_id = secret.store_id.as_deref().unwrap_or(locator);
                SecretReference::new(store_id, field)
            })
        }))
    }
}

// =============================================================================
// Network catalog
// =============================================================================

/// A subnet of a network
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Subnet {
    /// Subnet identifier
    pub id: String,
    /// Availability zone, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Whether tasks may be placed here
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

impl Subnet {
    /// An available subnet without zone information
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            zone: None,
            available: true,
        }
    }
}

/// What the catalog knows about one network
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NetworkInfo {
    /// Network identifier
    pub id: String,
    /// Subnets in the network
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

impl NetworkInfo {
    /// Subnets tasks may be placed in
    pub fn available_subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.subnets.iter().filter(|s| s.available)
    }
}

/// Trait abstracting the network inventory of the cluster's account
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkCatalog: Send + Sync {
    /// Describe `network`, or `Ok(None)` if it does not exist
    async fn describe(&self, network: &str) -> Result<Option<NetworkInfo>>;
}

/// Network catalog backed by a fixed list of networks
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryNetworkCatalog {
    networks: BTreeMap<String, NetworkInfo>,
}

impl InMemoryNetworkCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a network
    pub fn with_network(mut self, network: NetworkInfo) -> Self {
        self.networks.insert(network.id.clone(), network);
        self
    }
}

impl FromIterator<NetworkInfo> for InMemoryNetworkCatalog {
    fn from_iter<T: IntoIterator<Item = NetworkInfo>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |catalog, network| catalog.with_network(network))
    }
}

#[async_trait]
impl NetworkCatalog for InMemoryNetworkCatalog {
    async fn describe(&self, network: &str) -> Result<Option<NetworkInfo>> {
        Ok(self.networks.get(network).cloned())
    }
}

// =============================================================================
// Bounded lookups
// =============================================================================

/// Run a collaborator lookup under `timeout`, converting expiry to a typed error
pub(crate) async fn bounded<T, F>(
    collaborator: &str,
    target: &str,
    timeout: Duration,
    lookup: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => Err(Error::lookup_timeout(collaborator, target, timeout)),
    }
}
