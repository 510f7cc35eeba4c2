//! Worker startup command
//!
//! The worker reads its secrets from files and its settings from named flags.
//! The command therefore has two halves: a prelude that writes each bound
//! secret to a local file, and the worker invocation with one flag per row of
//! an ordered table. The table order is the order the worker parses; a
//! reordering would only surface at runtime, so it is pinned by a golden test.
//!
//! Values are never inlined. Flags reference `$VAR` and the shell expands
//! them inside the container after the orchestrator has injected secrets.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::runtime::{
    ENV_ENABLE_METRICS, ENV_ENDPOINT, ENV_PRICE_CONFIG_FILE, ENV_PRICE_SERVICE_ENDPOINT,
    ENV_PYTH_CONTRACT_ADDRESS,
};
use crate::secrets::SecretBinding;
use crate::{Error, Result};

/// Where a flag's value comes from
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FlagSource {
    /// An environment variable, passed as `$NAME`
    Env(String),
    /// A secret binding, passed as the path of its materialized file
    SecretFile(String),
}

/// One row of the flag table
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlagMapping {
    /// Flag as the worker expects it (e.g. "--endpoint")
    pub flag: String,
    /// Value source
    #[serde(flatten)]
    pub source: FlagSource,
}

impl FlagMapping {
    /// Flag fed from an environment variable
    pub fn env(flag: &str, name: &str) -> Self {
        Self {
            flag: flag.to_string(),
            source: FlagSource::Env(name.to_string()),
        }
    }

    /// Flag fed from a materialized secret file
    pub fn secret_file(flag: &str, secret: &str) -> Self {
        Self {
            flag: flag.to_string(),
            source: FlagSource::SecretFile(secret.to_string()),
        }
    }
}

/// Template the startup command is rendered from
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandTemplate {
    /// Shell argv prefix; the rendered script is appended as the last element
    pub shell: Vec<String>,
    /// Worker invocation before the flags
    pub entrypoint: String,
    /// Flags in the order the worker parses them
    pub flags: Vec<FlagMapping>,
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self::price_pusher()
    }
}

impl CommandTemplate {
    /// The EVM price pusher worker
    pub fn price_pusher() -> Self {
        Self {
            shell: vec!["/bin/sh".to_string(), "-c".to_string()],
            entrypoint: "npm start -- evm".to_string(),
            flags: vec![
                FlagMapping::env("--endpoint", ENV_ENDPOINT),
                FlagMapping::env("--price-service-endpoint", ENV_PRICE_SERVICE_ENDPOINT),
                FlagMapping::env("--pyth-contract-address", ENV_PYTH_CONTRACT_ADDRESS),
                FlagMapping::env("--enable-metrics", ENV_ENABLE_METRICS),
                FlagMapping::secret_file("--mnemonic-file", "MNEMONIC"),
                FlagMapping::env("--price-config-file", ENV_PRICE_CONFIG_FILE),
            ],
        }
    }

    /// File a secret binding is written to inside the container
    pub fn secret_file_path(secret: &str) -> String {
        format!("./{}", secret.to_ascii_lowercase())
    }

    /// Check the template is safe to splice into a shell script
    pub fn validate(&self) -> Result<()> {
        if self.shell.is_empty() {
            return Err(Error::validation("command template shell must not be empty"));
        }
        if self.entrypoint.trim().is_empty() {
            return Err(Error::validation("command template entrypoint must not be empty"));
        }

        let mut seen = BTreeSet::new();
        for mapping in &self.flags {
            let name = mapping.flag.strip_prefix("--").unwrap_or_default();
            let well_formed = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
            if !well_formed {
                return Err(Error::validation(format!(
                    "flag '{}' must look like --lower-kebab-case",
                    mapping.flag
                )));
            }
            if !seen.insert(mapping.flag.as_str()) {
                return Err(Error::validation(format!(
                    "flag '{}' appears more than once",
                    mapping.flag
                )));
            }
            let source = match &mapping.source {
                FlagSource::Env(name) | FlagSource::SecretFile(name) => name,
            };
            if !crate::spec::is_shell_identifier(source) {
                return Err(Error::validation(format!(
                    "flag '{}' source '{}' is not a shell identifier",
                    mapping.flag, source
                )));
            }
        }
        Ok(())
    }

    /// Render the argv for a task with `environment` and `bindings`
    ///
    /// Rows whose source is absent are skipped; every binding is materialized
    /// whether or not a row consumes it.
    pub fn render(
        &self,
        environment: &BTreeMap<String, String>,
        bindings: &[SecretBinding],
    ) -> Vec<String> {
        let bound: BTreeSet<&str> = bindings.iter().map(|b| b.env.as_str()).collect();

        let mut steps: Vec<String> = bindings
            .iter()
            .map(|b| format!("echo ${} > {}", b.env, Self::secret_file_path(&b.env)))
            .collect();

        let mut invocation = self.entrypoint.clone();
        for mapping in &self.flags {
            let value = match &mapping.source {
                FlagSource::Env(name) if environment.contains_key(name) => format!("${name}"),
                FlagSource::SecretFile(name) if bound.contains(name.as_str()) => {
                    Self::secret_file_path(name)
                }
                _ => continue,
            };
            invocation.push(' ');
            invocation.push_str(&mapping.flag);
            invocation.push(' ');
            invocation.push_str(&value);
        }
        steps.push(invocation);

        let mut argv = self.shell.clone();
        argv.push(steps.join(" && "));
        argv
    }
}
