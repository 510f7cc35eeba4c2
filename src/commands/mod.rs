//! CLI commands

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::debug;

use skipper_service::{ServiceComposer, ServiceDescriptor};

use crate::config::{CompileConfig, Inventory};
use crate::Result;

pub mod compile;
pub mod schema;
pub mod validate;

/// Where lookups are answered from, and how long each may take
#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    /// Inventory file listing networks and secret fields
    #[arg(long, env = "SKIPPER_INVENTORY")]
    pub inventory: PathBuf,

    /// Bound on each network or secret lookup, in seconds
    #[arg(long, env = "SKIPPER_LOOKUP_TIMEOUT_SECS", default_value_t = 10)]
    pub lookup_timeout_secs: u64,
}

/// Serialization of the emitted descriptor
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    /// Render `value` in this format
    pub fn render<T: Serialize>(self, value: &T) -> Result<String> {
        Ok(match self {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

/// Load both input files and compose the descriptor
pub async fn compose(config_path: &Path, inventory: &InventoryArgs) -> Result<ServiceDescriptor> {
    let config = CompileConfig::load(config_path)?;
    let (secrets, networks) = Inventory::load(&inventory.inventory)?.into_collaborators();
    debug!(
        config = %config_path.display(),
        inventory = %inventory.inventory.display(),
        "loaded inputs"
    );

    let mut composer = ServiceComposer::new(Arc::new(secrets), Arc::new(networks))
        .with_strategy(config.strategy)
        .with_lookup_timeout(Duration::from_secs(inventory.lookup_timeout_secs));
    if let Some(defaults) = config.defaults {
        composer = composer.with_defaults(defaults);
    }
    if let Some(template) = config.command {
        composer = composer.with_template(template);
    }

    Ok(composer.compose(&config.service).await?)
}
