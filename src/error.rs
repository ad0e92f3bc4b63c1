//! Error type for the fallible surfaces of the crate: configuration
//! validation and PML checkpoint I/O. The field kernels themselves are
//! infallible.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PicError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Checkpoint array {name} has shape {found}, expected {expected}")]
    CheckpointMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Level {level} out of range (have {nlevels} levels)")]
    LevelOutOfRange { level: usize, nlevels: usize },

    #[error("Block {block} out of range on level {level} (have {nblocks} blocks)")]
    BlockOutOfRange {
        level: usize,
        block: usize,
        nblocks: usize,
    },
}

impl PicError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PicError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PicError>;
