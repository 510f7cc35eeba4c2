//! Task identity resolution
//!
//! Every task runs under one role. The role always carries the baseline
//! task-execution grant (pull images, write logs); caller fragments are merged
//! on top by name. Merging only ever widens a grant. A fragment that would
//! flip the effect of an existing grant, or deny something the baseline
//! needs, fails resolution instead of picking a winner.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::spec::{PolicyEffect, PolicyFragment};
use crate::{Error, Result};

/// Principal allowed to assume task roles
pub const TASK_EXECUTION_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Managed policy backing the baseline grant
pub const TASK_EXECUTION_MANAGED_POLICY: &str = "service-role/AmazonECSTaskExecutionRolePolicy";

/// Name of the baseline grant
pub const TASK_EXECUTION_GRANT: &str = "task-execution";

const TASK_EXECUTION_ACTIONS: &[&str] = &[
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

/// One named permission statement attached to an identity
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Allow or deny
    pub effect: PolicyEffect,
    /// Covered actions, sorted
    pub actions: BTreeSet<String>,
    /// Covered resources, sorted
    pub resources: BTreeSet<String>,
    /// Managed policy this grant stands for, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_policy: Option<String>,
}

impl Grant {
    fn from_fragment(fragment: &PolicyFragment) -> Self {
        Self {
            effect: fragment.effect,
            actions: fragment.actions.iter().cloned().collect(),
            resources: fragment.resources.iter().cloned().collect(),
            managed_policy: None,
        }
    }

    /// Whether this grant's action patterns cover `action`
    pub fn covers(&self, action: &str) -> bool {
        self.actions.iter().any(|pattern| action_matches(pattern, action))
    }
}

// `*` matches everything, `svc:*` / `svc:Get*` match by prefix.
fn action_matches(pattern: &str, action: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => action.starts_with(prefix),
        None => pattern == action,
    }
}

/// The execution role a task runs under
///
/// Built only by [`IdentityResolver::resolve`] and widened only through
/// [`Identity::with_fragment`], which returns a new value.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(skip)]
    service: String,
    role_name: String,
    trusted_principal: String,
    grants: BTreeMap<String, Grant>,
}

impl Identity {
    /// Service this identity was resolved for
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Role name (`<service>-task-role`)
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Principal allowed to assume this role
    pub fn trusted_principal(&self) -> &str {
        &self.trusted_principal
    }

    /// All grants keyed by name
    pub fn grants(&self) -> &BTreeMap<String, Grant> {
        &self.grants
    }

    /// Look up one grant by name
    pub fn grant(&self, name: &str) -> Option<&Grant> {
        self.grants.get(name)
    }

    /// Whether some deny grant covers `action`
    pub fn denies(&self, action: &str) -> bool {
        self.grants
            .values()
            .any(|g| g.effect == PolicyEffect::Deny && g.covers(action))
    }

    /// Merge one more fragment, returning the widened identity
    pub fn with_fragment(mut self, fragment: &PolicyFragment) -> Result<Self> {
        self.merge(fragment)?;
        Ok(self)
    }

    fn merge(&mut self, fragment: &PolicyFragment) -> Result<()> {
        let service = self.service.clone();
        let incoming = Grant::from_fragment(fragment);

        if incoming.effect == PolicyEffect::Deny {
            if let Some(action) = TASK_EXECUTION_ACTIONS
                .iter()
                .find(|action| incoming.covers(action))
            {
                return Err(Error::conflicting_policy(
                    service,
                    &fragment.name,
                    format!("deny would revoke baseline action '{action}'"),
                ));
            }
        }

        match self.grants.get_mut(&fragment.name) {
            Some(existing) if existing.effect != incoming.effect => {
                Err(Error::conflicting_policy(
                    service,
                    &fragment.name,
                    format!(
                        "declared as {} and as {}",
                        existing.effect, fragment.effect
                    ),
                ))
            }
            Some(existing) => {
                existing.actions.extend(incoming.actions);
                existing.resources.extend(incoming.resources);
                Ok(())
            }
            None => {
                self.grants.insert(fragment.name.clone(), incoming);
                Ok(())
            }
        }
    }
}

/// Resolves the identity for a service
pub struct IdentityResolver;

impl IdentityResolver {
    /// Build the identity for `service_name` from caller fragments
    ///
    /// The baseline task-execution grant is inserted first, so caller input
    /// can extend it but never replace or revoke it.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConflictingPolicy` if two fragments share a name with
    /// different effects, or a deny fragment covers a baseline action.
    pub fn resolve(service_name: &str, fragments: &[PolicyFragment]) -> Result<Identity> {
        let mut identity = Identity {
            service: service_name.to_string(),
            role_name: format!("{service_name}-task-role"),
            trusted_principal: TASK_EXECUTION_PRINCIPAL.to_string(),
            grants: BTreeMap::from([(TASK_EXECUTION_GRANT.to_string(), baseline_grant())]),
        };

        for fragment in fragments {
            identity.merge(fragment)?;
        }

        Ok(identity)
    }
}

fn baseline_grant() -> Grant {
    Grant {
        effect: PolicyEffect::Allow,
        actions: TASK_EXECUTION_ACTIONS.iter().map(|a| a.to_string()).collect(),
        resources: BTreeSet::from(["*".to_string()]),
        managed_policy: Some(TASK_EXECUTION_MANAGED_POLICY.to_string()),
    }
}
