//! Network isolation boundary for a service
//!
//! One boundary per service, named from the service so recompiling never
//! creates a second group. The worker only makes outbound calls, so the
//! default is open egress and no ingress.

use std::time::Duration;

use serde::Serialize;

use crate::lookup::{bounded, NetworkCatalog, NetworkInfo, NETWORK_CATALOG};
use crate::{Error, Result};

/// Outbound traffic policy
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EgressPolicy {
    /// Any destination
    #[default]
    AllowAll,
    /// No outbound traffic except what rules allow
    DenyAll,
}

/// An inbound allow rule
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    /// "tcp" or "udp"
    pub protocol: String,
    /// Port allowed
    pub port: u16,
    /// Source CIDR
    pub source_cidr: String,
}

/// A named traffic-control group the service's tasks run in
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IsolationBoundary {
    /// Group name (`<service>-sg`)
    pub name: String,
    /// Network the group belongs to
    pub network: String,
    /// Human-readable description
    pub description: String,
    /// Outbound policy
    pub egress: EgressPolicy,
    /// Inbound rules; empty means unreachable from outside
    pub ingress: Vec<IngressRule>,
    /// Subnets tasks are placed in, sorted
    pub subnets: Vec<String>,
}

/// Derives the isolation boundary for a service
pub struct IsolationResolver;

impl IsolationResolver {
    /// Build the boundary for `service_name` inside `network`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidNetwork` if the network has no available subnet.
    pub fn resolve(service_name: &str, network: &NetworkInfo) -> Result<IsolationBoundary> {
        let mut subnets: Vec<String> = network
            .available_subnets()
            .map(|subnet| subnet.id.clone())
            .collect();
        subnets.sort();
        subnets.dedup();

        if subnets.is_empty() {
            return Err(Error::invalid_network(
                service_name,
                &network.id,
                "network has no available subnets",
            ));
        }

        Ok(IsolationBoundary {
            name: format!("{service_name}-sg"),
            network: network.id.clone(),
            description: format!("Security group for {service_name} backend service"),
            egress: EgressPolicy::AllowAll,
            ingress: Vec::new(),
            subnets,
        })
    }

    /// Fetch `network_id` from the catalog under `timeout`
    ///
    /// An unknown network has no usable subnet, so it is reported as
    /// `InvalidNetwork` rather than a lookup failure.
    pub async fn lookup(
        catalog: &dyn NetworkCatalog,
        service_name: &str,
        network_id: &str,
        timeout: Duration,
    ) -> Result<NetworkInfo> {
        bounded(
            NETWORK_CATALOG,
            network_id,
            timeout,
            catalog.describe(network_id),
        )
        .await?
        .ok_or_else(|| Error::invalid_network(service_name, network_id, "network not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{MockNetworkCatalog, Subnet};

    fn network(subnets: Vec<Subnet>) -> NetworkInfo {
        NetworkInfo {
            id: "vpc-main".to_string(),
            subnets,
        }
    }

    #[test]
    fn test_boundary_named_from_service() {
        let boundary = IsolationResolver::resolve(
            "price-pusher",
            &network(vec![Subnet::new("subnet-b"), Subnet::new("subnet-a")]),
        )
        .unwrap();

        assert_eq!(boundary.name, "price-pusher-sg");
        assert_eq!(boundary.network, "vpc-main");
        assert_eq!(boundary.egress, EgressPolicy::AllowAll);
        assert!(boundary.ingress.is_empty());
        assert_eq!(boundary.subnets, vec!["subnet-a", "subnet-b"]);
    }

    #[test]
    fn test_repeated_resolution_is_identical() {
        let net = network(vec![Subnet::new("subnet-a")]);
        assert_eq!(
            IsolationResolver::resolve("price-pusher", &net).unwrap(),
            IsolationResolver::resolve("price-pusher", &net).unwrap()
        );
    }

    #[test]
    fn test_no_subnets_is_invalid_network() {
        let err = IsolationResolver::resolve("price-pusher", &network(vec![])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNetwork");
    }

    #[test]
    fn test_only_unavailable_subnets_is_invalid_network() {
        let unavailable = Subnet {
            available: false,
            ..Subnet::new("subnet-a")
        };
        let err = IsolationResolver::resolve("price-pusher", &network(vec![unavailable]))
            .unwrap_err();
        assert!(err.to_string().contains("no available subnets"));
    }

    #[tokio::test]
    async fn test_lookup_unknown_network_is_invalid() {
        let mut catalog = MockNetworkCatalog::new();
        catalog
            .expect_describe()
            .withf(|id| id == "vpc-gone")
            .times(1)
            .returning(|_| Ok(None));

        let err = IsolationResolver::lookup(&catalog, "price-pusher", "vpc-gone", Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            Error::InvalidNetwork { network, .. } => assert_eq!(network, "vpc-gone"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
