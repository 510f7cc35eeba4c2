//! Secret binding resolution
//!
//! Maps each secret the container needs to a field of the service's entry in
//! the external store (`<service>/config`). The store is only asked whether a
//! field exists; values are injected by the orchestrator at task start and
//! never pass through here.
//!
//! Resolving bindings also widens the task identity with read access to the
//! referenced store entries, so the role and the bindings cannot drift apart.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::identity::Identity;
use crate::lookup::{bounded, SecretReference, SecretStore, SECRET_STORE};
use crate::spec::PolicyFragment;
use crate::{Error, Result};

/// Name of the grant that lets the task read its secrets
pub const SECRET_READ_GRANT: &str = "secret-store-read";

/// Action the orchestrator needs to inject secret values
pub const SECRET_READ_ACTION: &str = "secretsmanager:GetSecretValue";

/// Environment variable name → external secret field
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SecretBinding {
    /// Variable name inside the container
    pub env: String,
    /// Where the value lives
    #[serde(rename = "ref")]
    pub reference: SecretReference,
}

/// Output of secret resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSecrets {
    /// Identity widened with read access to every referenced store entry
    pub identity: Identity,
    /// Bindings in the order the secrets were declared
    pub bindings: Vec<SecretBinding>,
}

/// Resolves required secret names against the external store
pub struct SecretBindingResolver<'a> {
    store: &'a dyn SecretStore,
    timeout: Duration,
}

impl<'a> SecretBindingResolver<'a> {
    /// Create a resolver over `store`, bounding each lookup by `timeout`
    pub fn new(store: &'a dyn SecretStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Bind every name in `required` to a field under `locator`
    ///
    /// Lookups run concurrently. Nothing is cached between calls.
    ///
    /// # Errors
    ///
    /// - `Error::SecretNotFound` for the first declared name the store lacks
    /// - `Error::ConflictingPolicy` if the identity denies secret reads
    /// - `Error::LookupTimeout` / `Error::Lookup` if the store misbehaves
    pub async fn resolve(
        &self,
        identity: Identity,
        locator: &str,
        required: &[String],
    ) -> Result<ResolvedSecrets> {
        if required.is_empty() {
            return Ok(ResolvedSecrets {
                identity,
                bindings: Vec::new(),
            });
        }

        if identity.denies(SECRET_READ_ACTION) {
            return Err(Error::conflicting_policy(
                identity.service(),
                SECRET_READ_GRANT,
                format!("identity denies {SECRET_READ_ACTION} but secrets are required"),
            ));
        }

        let lookups = required.iter().map(|field| {
            let target = format!("{locator}#{field}");
            async move {
                bounded(
                    SECRET_STORE,
                    &target,
                    self.timeout,
                    self.store.lookup(locator, field),
                )
                .await
            }
        });
        let found = futures::future::try_join_all(lookups).await?;

        let mut bindings = Vec::with_capacity(required.len());
        for (field, reference) in required.iter().zip(found) {
            let reference = reference.ok_or_else(|| Error::secret_not_found(locator, field))?;
            debug!(env = %field, reference = %reference, "bound secret");
            bindings.push(SecretBinding {
                env: field.clone(),
                reference,
            });
        }

        let store_ids: BTreeSet<String> = bindings
            .iter()
            .map(|b| b.reference.store_id.clone())
            .collect();
        let identity = identity.with_fragment(&PolicyFragment::allow(
            SECRET_READ_GRANT,
            [SECRET_READ_ACTION],
            store_ids,
        ))?;

        Ok(ResolvedSecrets { identity, bindings })
    }
}
