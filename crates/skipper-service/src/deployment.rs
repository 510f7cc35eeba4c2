//! Deployment policy selection
//!
//! Maps the requested rollout strategy onto the concrete bounds the
//! orchestrator's deployment controller enforces.

use serde::Serialize;
use tracing::warn;

use crate::spec::{DeploymentStrategy, RollingParams};
use crate::{Error, Result};

/// Lowest `min_healthy_percent` a rolling rollout may use
pub const ROLLING_MIN_HEALTHY_FLOOR: u32 = 50;

/// Controller that performs rollouts
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentController {
    /// The orchestrator's built-in rolling controller
    #[default]
    Native,
}

/// Rollout parameters for the service
///
/// With `rollback_on_failure` disabled, a failed rollout is not reverted: the
/// service is left partially updated and needs manual intervention. The
/// `singleton-replace` strategy accepts this together with a zero healthy
/// floor, so a single worker can be replaced without ever running two.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPolicy {
    /// Tasks to keep running
    pub desired_count: u32,
    /// Healthy tasks kept during a rollout, percent of desired
    pub min_healthy_percent: u32,
    /// Running tasks allowed during a rollout, percent of desired
    pub max_healthy_percent: u32,
    /// Revert automatically when a rollout fails
    pub rollback_on_failure: bool,
    /// Controller kind
    pub controller: DeploymentController,
    /// Strategy this policy was selected from
    pub strategy: String,
}

impl DeploymentPolicy {
    /// Select the policy for `strategy`
    ///
    /// # Errors
    ///
    /// For `rolling`:
    /// - `Error::ConflictingDeploymentBounds` if min healthy is below 50 or
    ///   above max healthy
    /// - `Error::Validation` if the desired count is zero
    pub fn select(strategy: &DeploymentStrategy) -> Result<Self> {
        match strategy {
            DeploymentStrategy::SingletonReplace => {
                warn!(
                    strategy = strategy.as_str(),
                    "rollback on failure is disabled; a failed rollout needs manual intervention"
                );
                Ok(Self {
                    desired_count: 1,
                    min_healthy_percent: 0,
                    max_healthy_percent: 100,
                    rollback_on_failure: false,
                    controller: DeploymentController::Native,
                    strategy: strategy.as_str().to_string(),
                })
            }
            DeploymentStrategy::Rolling(params) => Self::rolling(strategy, params),
        }
    }

    fn rolling(strategy: &DeploymentStrategy, params: &RollingParams) -> Result<Self> {
        let RollingParams {
            desired_count,
            min_healthy_percent: min,
            max_healthy_percent: max,
        } = *params;

        if min < ROLLING_MIN_HEALTHY_FLOOR {
            return Err(Error::deployment_bounds(
                min,
                max,
                format!("rolling requires min healthy of at least {ROLLING_MIN_HEALTHY_FLOOR}%"),
            ));
        }
        if min > max {
            return Err(Error::deployment_bounds(
                min,
                max,
                "min healthy must not exceed max healthy",
            ));
        }
        if desired_count == 0 {
            return Err(Error::validation(
                "rolling requires a desired count of at least 1",
            ));
        }

        Ok(Self {
            desired_count,
            min_healthy_percent: min,
            max_healthy_percent: max,
            rollback_on_failure: true,
            controller: DeploymentController::Native,
            strategy: strategy.as_str().to_string(),
        })
    }
}
