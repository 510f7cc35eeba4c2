//! Named runtime default records
//!
//! The worker needs a chain endpoint, a price service endpoint, a contract
//! address and a price config path on every start. These are grouped into a
//! named record passed explicitly to the task builder, so two environments
//! can be compiled side by side without touching process-wide state.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Chain RPC endpoint
pub const ENV_ENDPOINT: &str = "ENDPOINT";
/// Price service endpoint
pub const ENV_PRICE_SERVICE_ENDPOINT: &str = "PRICE_SERVICE_ENDPOINT";
/// On-chain price contract address
pub const ENV_PYTH_CONTRACT_ADDRESS: &str = "PYTH_CONTRACT_ADDRESS";
/// Path of the price feed config inside the container
pub const ENV_PRICE_CONFIG_FILE: &str = "PRICE_CONFIG_FILE";
/// Whether the worker exposes its metrics endpoint
pub const ENV_ENABLE_METRICS: &str = "ENABLE_METRICS";

/// Name of the built-in profile
pub const BSC_HERMES_PROFILE: &str = "bsc-hermes";

/// A named set of mandatory runtime values for the worker
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuntimeDefaults {
    /// Profile name, for logs and the emitted descriptor
    pub name: String,
    /// Chain RPC endpoint
    pub endpoint: String,
    /// Price service endpoint
    pub price_service_endpoint: String,
    /// Price contract address on the target chain
    pub pyth_contract_address: String,
    /// Price config file path inside the image
    pub price_config_file: String,
    /// Expose worker metrics
    #[serde(default)]
    pub enable_metrics: bool,
}

impl RuntimeDefaults {
    /// BSC mainnet with the public Hermes price service
    pub fn bsc_hermes() -> Self {
        Self {
            name: BSC_HERMES_PROFILE.to_string(),
            endpoint: "https://bsc-dataseed2.binance.org".to_string(),
            price_service_endpoint: "https://hermes.pyth.network".to_string(),
            pyth_contract_address: "0xd7308b14BF4008e7C7196eC35610B1427C5702EA".to_string(),
            price_config_file: "./price-config.hypurr.yaml".to_string(),
            enable_metrics: false,
        }
    }

    /// Render as container environment variables
    pub fn to_environment(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (ENV_ENDPOINT.to_string(), self.endpoint.clone()),
            (
                ENV_PRICE_SERVICE_ENDPOINT.to_string(),
                self.price_service_endpoint.clone(),
            ),
            (
                ENV_PYTH_CONTRACT_ADDRESS.to_string(),
                self.pyth_contract_address.clone(),
            ),
            (
                ENV_PRICE_CONFIG_FILE.to_string(),
                self.price_config_file.clone(),
            ),
            (
                ENV_ENABLE_METRICS.to_string(),
                self.enable_metrics.to_string(),
            ),
        ])
    }
}

impl Default for RuntimeDefaults {
    fn default() -> Self {
        Self::bsc_hermes()
    }
}
