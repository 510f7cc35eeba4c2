//! Skipper CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand, ValueEnum};
use skipper_common::telemetry::LogFormat;

/// Skipper - compile a backend worker service into a deployable descriptor
#[derive(Parser, Debug)]
#[command(name = "skipper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log line format (logs go to stderr)
    #[arg(
        long,
        global = true,
        value_enum,
        env = "SKIPPER_LOG_FORMAT",
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a service into a descriptor and print it
    Compile(commands::compile::CompileArgs),
    /// Compile a service and print only its summary
    Validate(commands::validate::ValidateArgs),
    /// Print the JSON schema of the compile config
    Schema,
}

/// `--log-format` values
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Compile(args) => commands::compile::run(args).await,
            Commands::Validate(args) => commands::validate::run(args).await,
            Commands::Schema => commands::schema::run(),
        }
    }
}
