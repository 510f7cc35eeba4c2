//! Validate command
//!
//! Runs a full compile and prints only the summary line, for CI gates that
//! need the exit status and not the descriptor.

use std::path::PathBuf;

use clap::Args;

use super::InventoryArgs;
use crate::Result;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Compile config file (YAML or JSON)
    #[arg(short = 'f', long = "config")]
    pub config: PathBuf,

    #[command(flatten)]
    pub inventory: InventoryArgs,
}

/// Compose the descriptor and return its summary line
pub async fn summarize(args: &ValidateArgs) -> Result<String> {
    let descriptor = super::compose(&args.config, &args.inventory).await?;
    Ok(descriptor.summary())
}

pub async fn run(args: ValidateArgs) -> Result<()> {
    println!("{}", summarize(&args).await?);
    Ok(())
}
