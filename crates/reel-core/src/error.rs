use std::path::PathBuf;
use thiserror::Error;

/// Core error type for reel operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn bundler {program}: {source}")]
    BundlerSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bundler stream closed unexpectedly")]
    BundlerClosed,

    #[error("Malformed record on line {line}: {message}")]
    Tabular { line: usize, message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
