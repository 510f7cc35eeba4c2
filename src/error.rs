//! Error types for the CLI

use std::path::PathBuf;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {kind} in {path}: {source}")]
    InvalidInput {
        kind: &'static str,
        path: PathBuf,
        source: skipper_common::Error,
    },

    #[error("compile failed ({kind}): {0}", kind = .0.kind())]
    Compile(#[from] skipper_common::Error),
}

impl Error {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Read {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_input(
        kind: &'static str,
        path: impl Into<PathBuf>,
        source: skipper_common::Error,
    ) -> Self {
        Error::InvalidInput {
            kind,
            path: path.into(),
            source,
        }
    }
}
