//! End-to-end composition tests against in-memory collaborators

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use skipper_common::spec::{
    ComputeSizing, DeploymentStrategy, LogSpec, PolicyFragment, RollingParams, ServiceSpec,
};
use skipper_common::{Error, Result};
use skipper_service::deployment::DeploymentPolicy;
use skipper_service::identity::{TASK_EXECUTION_GRANT, TASK_EXECUTION_MANAGED_POLICY};
use skipper_service::lookup::{
    InMemoryNetworkCatalog, InMemorySecretStore, NetworkInfo, SecretReference, SecretStore,
    Subnet,
};
use skipper_service::secrets::SECRET_READ_GRANT;
use skipper_service::ServiceComposer;

// =============================================================================
// Fixtures
// =============================================================================

const LOCATOR: &str = "price-pusher/config";

fn price_pusher(secrets: &[&str]) -> ServiceSpec {
    ServiceSpec {
        name: "price-pusher".to_string(),
        cluster: "pusher-cluster".to_string(),
        network: "vpc-main".to_string(),
        environment: BTreeMap::new(),
        secrets: secrets.iter().map(|s| s.to_string()).collect(),
        policies: Vec::new(),
        sizing: ComputeSizing::default(),
        image: None,
        logging: LogSpec::default(),
    }
}

fn networks() -> Arc<InMemoryNetworkCatalog> {
    Arc::new(InMemoryNetworkCatalog::new().with_network(NetworkInfo {
        id: "vpc-main".to_string(),
        subnets: vec![Subnet::new("subnet-1"), Subnet::new("subnet-0")],
    }))
}

fn store(fields: &[&str]) -> Arc<InMemorySecretStore> {
    Arc::new(InMemorySecretStore::new().with_secret(LOCATOR, fields.iter().copied()))
}

/// Store wrapper counting lookups
struct CountingStore {
    inner: InMemorySecretStore,
    calls: AtomicUsize,
}

#[async_trait]
impl SecretStore for CountingStore {
    async fn lookup(&self, locator: &str, field: &str) -> Result<Option<SecretReference>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(locator, field).await
    }
}

// =============================================================================
// Story: Secret binding
// =============================================================================

#[tokio::test]
async fn story_present_secrets_bind_exactly_the_required_set() {
    let required = ["MNEMONIC", "API_KEY", "RPC_TOKEN"];
    let composer = ServiceComposer::new(store(&["RPC_TOKEN", "MNEMONIC", "API_KEY", "UNUSED"]), networks());

    let descriptor = composer.compose(&price_pusher(&required)).await.unwrap();

    let bound: Vec<_> = descriptor
        .task
        .secrets()
        .iter()
        .map(|b| b.env.as_str())
        .collect();
    assert_eq!(bound, required);
}

#[tokio::test]
async fn story_mnemonic_binding_shape() {
    let composer = ServiceComposer::new(store(&["MNEMONIC"]), networks());
    let descriptor = composer.compose(&price_pusher(&["MNEMONIC"])).await.unwrap();

    let json = serde_json::to_value(descriptor.task.secrets()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{"env": "MNEMONIC", "ref": "price-pusher/config#MNEMONIC"}])
    );
}

#[tokio::test]
async fn story_missing_mnemonic_is_secret_not_found() {
    let composer = ServiceComposer::new(store(&["API_KEY"]), networks());

    match composer.compose(&price_pusher(&["MNEMONIC"])).await.unwrap_err() {
        Error::SecretNotFound { locator, field } => {
            assert_eq!(locator, LOCATOR);
            assert_eq!(field, "MNEMONIC");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn story_missing_secret_never_reaches_task_builder() {
    // Unschedulable sizing would be the builder's error; seeing the secret
    // error instead shows the builder never ran.
    let mut spec = price_pusher(&["MNEMONIC"]);
    spec.sizing = ComputeSizing {
        cpu: 300,
        memory_mib: 700,
    };
    let counting = Arc::new(CountingStore {
        inner: InMemorySecretStore::new(),
        calls: AtomicUsize::new(0),
    });
    let composer = ServiceComposer::new(counting.clone(), networks());

    let err = composer.compose(&spec).await.unwrap_err();
    assert_eq!(err.kind(), "SecretNotFound");
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn story_secret_lookups_are_not_cached() {
    let counting = Arc::new(CountingStore {
        inner: InMemorySecretStore::new().with_secret(LOCATOR, ["MNEMONIC"]),
        calls: AtomicUsize::new(0),
    });
    let composer = ServiceComposer::new(counting.clone(), networks());
    let spec = price_pusher(&["MNEMONIC"]);

    composer.compose(&spec).await.unwrap();
    composer.compose(&spec).await.unwrap();
    assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn story_secrets_sharing_a_file_name_are_rejected_before_lookup() {
    let counting = Arc::new(CountingStore {
        inner: InMemorySecretStore::new().with_secret(LOCATOR, ["MNEMONIC", "mnemonic"]),
        calls: AtomicUsize::new(0),
    });
    let composer = ServiceComposer::new(counting.clone(), networks());

    let err = composer
        .compose(&price_pusher(&["MNEMONIC", "mnemonic"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "Validation");
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Story: Identity
// =============================================================================

#[tokio::test]
async fn story_baseline_grant_present_without_fragments() {
    let composer = ServiceComposer::new(store(&[]), networks());
    let descriptor = composer.compose(&price_pusher(&[])).await.unwrap();

    let role = descriptor.task.task_role();
    assert_eq!(role.trusted_principal(), "ecs-tasks.amazonaws.com");
    let baseline = role.grant(TASK_EXECUTION_GRANT).unwrap();
    assert_eq!(
        baseline.managed_policy.as_deref(),
        Some(TASK_EXECUTION_MANAGED_POLICY)
    );
    assert!(baseline.covers("ecr:BatchGetImage"));
    assert!(baseline.covers("logs:PutLogEvents"));
    assert!(role.grant(SECRET_READ_GRANT).is_none());
}

#[tokio::test]
async fn story_secrets_read_allow_and_deny_conflict() {
    let mut spec = price_pusher(&["MNEMONIC"]);
    spec.policies = vec![
        PolicyFragment::allow("secrets-read", ["secretsmanager:GetSecretValue"], ["*"]),
        PolicyFragment::deny("secrets-read", ["secretsmanager:GetSecretValue"], ["*"]),
    ];
    let composer = ServiceComposer::new(store(&["MNEMONIC"]), networks());

    match composer.compose(&spec).await.unwrap_err() {
        Error::ConflictingPolicy { policy, .. } => assert_eq!(policy, "secrets-read"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn story_caller_fragment_named_like_read_grant_must_allow() {
    let mut spec = price_pusher(&["MNEMONIC"]);
    spec.policies = vec![PolicyFragment::deny(SECRET_READ_GRANT, ["kms:Decrypt"], ["*"])];
    let composer = ServiceComposer::new(store(&["MNEMONIC"]), networks());

    let err = composer.compose(&spec).await.unwrap_err();
    assert_eq!(err.kind(), "ConflictingPolicy");
}

// =============================================================================
// Story: Deployment policy
// =============================================================================

#[tokio::test]
async fn story_singleton_replace_is_default() {
    let composer = ServiceComposer::new(store(&["MNEMONIC"]), networks());
    let descriptor = composer.compose(&price_pusher(&["MNEMONIC"])).await.unwrap();

    let deployment = &descriptor.deployment;
    assert_eq!(deployment.desired_count, 1);
    assert_eq!(deployment.min_healthy_percent, 0);
    assert_eq!(deployment.max_healthy_percent, 100);
    assert!(!deployment.rollback_on_failure);
}

#[test]
fn story_rolling_rejects_low_min_healthy() {
    let err = DeploymentPolicy::select(&DeploymentStrategy::Rolling(RollingParams {
        desired_count: 2,
        min_healthy_percent: 25,
        max_healthy_percent: 200,
    }))
    .unwrap_err();
    assert_eq!(err.kind(), "ConflictingDeploymentBounds");
}

// =============================================================================
// Story: Determinism and shape
// =============================================================================

#[tokio::test]
async fn story_compose_is_idempotent() {
    let composer = ServiceComposer::new(store(&["MNEMONIC"]), networks());
    let spec = price_pusher(&["MNEMONIC"]);

    let first = serde_json::to_vec(&composer.compose(&spec).await.unwrap()).unwrap();
    let second = serde_json::to_vec(&composer.compose(&spec).await.unwrap()).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn story_golden_command_line() {
    let composer = ServiceComposer::new(store(&["MNEMONIC"]), networks());
    let descriptor = composer.compose(&price_pusher(&["MNEMONIC"])).await.unwrap();

    assert_eq!(
        descriptor.task.command(),
        [
            "/bin/sh",
            "-c",
            "echo $MNEMONIC > ./mnemonic && npm start -- evm \
             --endpoint $ENDPOINT \
             --price-service-endpoint $PRICE_SERVICE_ENDPOINT \
             --pyth-contract-address $PYTH_CONTRACT_ADDRESS \
             --enable-metrics $ENABLE_METRICS \
             --mnemonic-file ./mnemonic \
             --price-config-file $PRICE_CONFIG_FILE",
        ]
    );
}

#[tokio::test]
async fn story_descriptor_serializes_without_secret_values() {
    let composer = ServiceComposer::new(store(&["MNEMONIC"]), networks());
    let descriptor = composer.compose(&price_pusher(&["MNEMONIC"])).await.unwrap();
    let json = serde_json::to_value(&descriptor).unwrap();

    assert_eq!(json["assignPublicIp"], false);
    assert_eq!(json["isolation"]["name"], "price-pusher-sg");
    assert_eq!(json["isolation"]["subnets"], serde_json::json!(["subnet-0", "subnet-1"]));
    assert_eq!(json["task"]["containerName"], "price-pusher-backend");
    assert_eq!(json["task"]["taskRole"]["roleName"], "price-pusher-task-role");
    assert_eq!(json["task"]["logging"]["retentionDays"], 3);
    assert!(json["task"]["environment"].get("MNEMONIC").is_none());
}
