//! Error types surfaced by the engine.

use block::TryBuildError;
use config::ConfigError;
use keylog::KeyLogError;
use std::io;
use thiserror::Error;

/// A partition could not be built within the seed budget.
///
/// The compaction that hit it published nothing and left the write buffer
/// and deferred log untouched.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("partition {partition} ({keys} keys) failed to build after {attempts} attempt(s)")]
pub struct BuildError {
    pub partition: usize,
    pub keys: usize,
    pub attempts: u32,
    /// Failure of the final attempt.
    #[source]
    pub last: TryBuildError,
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A saved map is truncated, corrupted or from an unknown version.
    #[error("malformed map file: {0}")]
    Format(String),

    #[error("deferred log: {0}")]
    KeyLog(#[from] KeyLogError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("key too large: {len} bytes (max {max})")]
    KeyTooLarge { len: usize, max: usize },

    /// A setting that existing generations depend on was changed.
    #[error("cannot change {0} once generations exist")]
    Reconfigure(&'static str),

    #[error("sequence number overflow")]
    SequenceOverflow,
}

impl MapError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        MapError::Format(msg.into())
    }
}
