//! Input files for `skipper compile` and `skipper validate`
//!
//! Two documents, both YAML (or JSON):
//! - the compile config: the service plus optional runtime defaults, rollout
//!   strategy and command template
//! - the inventory: which networks exist and which secret fields the store
//!   holds. It never contains secret values.

use std::path::Path;

use schemars::JsonSchema;
use serde::Deserialize;

use skipper_common::runtime::RuntimeDefaults;
use skipper_common::spec::{DeploymentStrategy, ServiceSpec};
use skipper_common::yaml::from_yaml_str;
use skipper_service::lookup::{InMemoryNetworkCatalog, InMemorySecretStore, NetworkInfo};
use skipper_service::task::CommandTemplate;

use crate::{Error, Result};

const COMPILE_CONFIG_KIND: &str = "compile config";
const INVENTORY_KIND: &str = "inventory";

/// Everything needed to compile one service
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompileConfig {
    /// The service to compile
    pub service: ServiceSpec,
    /// Runtime defaults record; the built-in `bsc-hermes` profile if omitted
    #[serde(default)]
    pub defaults: Option<RuntimeDefaults>,
    /// Rollout strategy; `singleton-replace` if omitted
    #[serde(default)]
    pub strategy: DeploymentStrategy,
    /// Worker command template; the price pusher template if omitted
    #[serde(default)]
    pub command: Option<CommandTemplate>,
}

impl CompileConfig {
    /// Parse a compile config document
    pub fn parse(input: &str) -> skipper_common::Result<Self> {
        from_yaml_str(input, COMPILE_CONFIG_KIND)
    }

    /// Read and parse a compile config file
    pub fn load(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        Self::parse(&input).map_err(|e| Error::invalid_input(COMPILE_CONFIG_KIND, path, e))
    }
}

/// File-backed view of the external collaborators
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Inventory {
    /// Networks the cluster account offers
    #[serde(default)]
    pub networks: Vec<NetworkInfo>,
    /// Secret locators and the field names each holds
    #[serde(default)]
    pub secrets: InMemorySecretStore,
}

impl Inventory {
    /// Parse an inventory document
    pub fn parse(input: &str) -> skipper_common::Result<Self> {
        from_yaml_str(input, INVENTORY_KIND)
    }

    /// Read and parse an inventory file
    pub fn load(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        Self::parse(&input).map_err(|e| Error::invalid_input(INVENTORY_KIND, path, e))
    }

    /// Split into the two collaborators the composer consumes
    pub fn into_collaborators(self) -> (InMemorySecretStore, InMemoryNetworkCatalog) {
        (self.secrets, self.networks.into_iter().collect())
    }
}
