//! Schema command

use schemars::schema_for;

use crate::config::CompileConfig;
use crate::Result;

/// JSON schema of the compile config, pretty-printed
pub fn render() -> Result<String> {
    Ok(serde_json::to_string_pretty(&schema_for!(CompileConfig))?)
}

pub fn run() -> Result<()> {
    println!("{}", render()?);
    Ok(())
}
