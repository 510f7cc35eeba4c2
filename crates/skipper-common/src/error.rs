//! Error types for the skipper compiler
//!
//! Errors are structured with fields so a failed compile can be diagnosed
//! without re-running it. Every variant is terminal for the current
//! `compose` call: nothing here is retried internally, and the caller decides
//! whether to fix the input (or the external store) and compile again.

use std::time::Duration;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for skipper operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two identity policy fragments share a name but disagree on effect
    #[error("conflicting policy '{policy}' for {service}: {message}")]
    ConflictingPolicy {
        /// Service whose identity was being resolved
        service: String,
        /// Name of the policy fragment that conflicts
        policy: String,
        /// Description of the conflict
        message: String,
    },

    /// The target network has no usable subnet
    #[error("invalid network '{network}' for {service}: {message}")]
    InvalidNetwork {
        /// Service the isolation boundary was being derived for
        service: String,
        /// Network identifier supplied by the caller
        network: String,
        /// Description of what's unusable
        message: String,
    },

    /// A required secret field is absent from the external store
    #[error("secret field '{field}' not found in '{locator}'")]
    SecretNotFound {
        /// Store locator that was searched (e.g. "price-pusher/config")
        locator: String,
        /// Field name that was required
        field: String,
    },

    /// The (CPU, memory) pair is not one the orchestrator can schedule
    #[error("unsupported sizing for {service}: {cpu} CPU units with {memory_mib} MiB")]
    UnsupportedSizing {
        /// Service being compiled
        service: String,
        /// Requested CPU units
        cpu: u32,
        /// Requested memory in MiB
        memory_mib: u32,
    },

    /// Deployment healthy-percent bounds are inconsistent or unsafe
    #[error("conflicting deployment bounds: min healthy {min_healthy_percent}% / max healthy {max_healthy_percent}%: {message}")]
    ConflictingDeploymentBounds {
        /// Requested minimum healthy percent
        min_healthy_percent: u32,
        /// Requested maximum healthy percent
        max_healthy_percent: u32,
        /// Which rule was violated
        message: String,
    },

    /// Validation error for malformed input
    #[error("validation error for {service}: {message}")]
    Validation {
        /// Name of the service with invalid configuration
        service: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "environment.MY-VAR")
        field: Option<String>,
    },

    /// An external collaborator did not answer within its bound
    #[error("{collaborator} lookup for '{target}' timed out after {timeout:?}")]
    LookupTimeout {
        /// Collaborator that was queried ("secret-store", "network-catalog")
        collaborator: String,
        /// What was being looked up
        target: String,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// An external collaborator failed while answering a lookup
    #[error("{collaborator} lookup failed: {message}")]
    Lookup {
        /// Collaborator that was queried
        collaborator: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The document kind being handled (if known)
        kind: Option<String>,
    },
}

impl Error {
    /// Create a conflicting policy error
    pub fn conflicting_policy(
        service: impl Into<String>,
        policy: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::ConflictingPolicy {
            service: service.into(),
            policy: policy.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid network error
    pub fn invalid_network(
        service: impl Into<String>,
        network: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::InvalidNetwork {
            service: service.into(),
            network: network.into(),
            message: msg.into(),
        }
    }

    /// Create a secret-not-found error
    pub fn secret_not_found(locator: impl Into<String>, field: impl Into<String>) -> Self {
        Self::SecretNotFound {
            locator: locator.into(),
            field: field.into(),
        }
    }

    /// Create a deployment bounds error
    pub fn deployment_bounds(min: u32, max: u32, msg: impl Into<String>) -> Self {
        Self::ConflictingDeploymentBounds {
            min_healthy_percent: min,
            max_healthy_percent: max,
            message: msg.into(),
        }
    }

    /// Create a validation error with the given message
    ///
    /// For simple validation errors without service context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            service: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with service context
    pub fn validation_for(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            service: service.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with service context and field path
    pub fn validation_for_field(
        service: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            service: service.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a lookup timeout error
    pub fn lookup_timeout(
        collaborator: impl Into<String>,
        target: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::LookupTimeout {
            collaborator: collaborator.into(),
            target: target.into(),
            timeout,
        }
    }

    /// Create a collaborator failure error
    pub fn lookup(collaborator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Lookup {
            collaborator: collaborator.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific document kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Stable label for this error kind, used in logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConflictingPolicy { .. } => "ConflictingPolicy",
            Self::InvalidNetwork { .. } => "InvalidNetwork",
            Self::SecretNotFound { .. } => "SecretNotFound",
            Self::UnsupportedSizing { .. } => "UnsupportedSizing",
            Self::ConflictingDeploymentBounds { .. } => "ConflictingDeploymentBounds",
            Self::Validation { .. } => "Validation",
            Self::LookupTimeout { .. } => "LookupTimeout",
            Self::Lookup { .. } => "Lookup",
            Self::Serialization { .. } => "Serialization",
        }
    }

    /// Whether re-running the same compile could succeed without changing input
    ///
    /// Only collaborator failures qualify. The compiler itself never retries;
    /// this is a hint for the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LookupTimeout { .. } | Self::Lookup { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
