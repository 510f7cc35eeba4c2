//! Compile command

use std::path::PathBuf;

use clap::Args;

use super::{InventoryArgs, OutputFormat};
use crate::Result;

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Compile config file (YAML or JSON)
    #[arg(short = 'f', long = "config")]
    pub config: PathBuf,

    #[command(flatten)]
    pub inventory: InventoryArgs,

    /// Descriptor output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,
}

/// Compose the descriptor and render it without printing
pub async fn render(args: &CompileArgs) -> Result<String> {
    let descriptor = super::compose(&args.config, &args.inventory).await?;
    args.output.render(&descriptor)
}

pub async fn run(args: CompileArgs) -> Result<()> {
    let rendered = render(&args).await?;
    println!("{}", rendered.trim_end());
    Ok(())
}
