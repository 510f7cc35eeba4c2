//! Skipper
//!
//! Compiles one backend worker service into a deployable descriptor.

use anyhow::Context;
use clap::Parser;

use skipper::Cli;
use skipper_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        format: cli.log_format.into(),
        ..TelemetryConfig::default()
    })
    .context("failed to initialize logging")?;

    cli.run().await?;
    Ok(())
}
