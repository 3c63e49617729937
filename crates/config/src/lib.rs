//! # Config - Succinct Map Configuration
//!
//! Construction-time options for the succinct map engine. Every option is
//! fixed once the engine is created; a saved map carries its own copy of the
//! configuration and restores it on load.
//!
//! ## Environment
//!
//! [`MapConfig::from_env`] reads the following variables, falling back to the
//! default for anything unset or unparsable:
//!
//! ```text
//! SMAP_SEED            hash family seed               (default: 0x9e3779b97f4a7c15)
//! SMAP_FP_LEN          false-positive suppression bits (default: 0 = disabled)
//! SMAP_BUFFER          buffered entries before build   (default: 1000000)
//! SMAP_PARTITIONS      blocks per generation           (default: 16)
//! SMAP_ENCODING        plain | binary | gamma          (default: binary)
//! SMAP_LOAD_FACTOR     slots per key                   (default: 1.3)
//! SMAP_BUILD_ATTEMPTS  seeds tried per block           (default: 32)
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Default hash family seed.
pub const DEFAULT_SEED: u64 = 0x9e37_79b9_7f4a_7c15;
/// Default number of buffered entries that forces a build.
pub const DEFAULT_BUFFER_THRESHOLD: usize = 1_000_000;
/// Default number of blocks per generation.
pub const DEFAULT_PARTITION_COUNT: usize = 16;
/// Default slots allocated per key. Must stay above the 3-hypergraph peeling
/// threshold (~1.222) for construction to succeed reliably.
pub const DEFAULT_LOAD_FACTOR: f64 = 1.3;
/// Largest accepted load factor.
pub const MAX_LOAD_FACTOR: f64 = 16.0;
/// Default number of seeds tried for a single block before giving up.
pub const DEFAULT_MAX_BUILD_ATTEMPTS: u32 = 32;
/// Largest supported false-positive suppression length in bits.
pub const MAX_FP_LEN: u32 = 32;
/// Largest supported number of blocks per generation.
pub const MAX_PARTITION_COUNT: usize = 1 << 20;

/// How the integer payload of each key is represented inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueEncoding {
    /// The value itself, at the bit width of the largest value in the block.
    Plain,
    /// A deduplicated code, at the bit width of the largest code in the block.
    #[default]
    Binary,
    /// A deduplicated code written as an Elias-gamma codeword.
    Gamma,
}

impl ValueEncoding {
    /// Stable identifier used in the persisted file.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            ValueEncoding::Plain => 0,
            ValueEncoding::Binary => 1,
            ValueEncoding::Gamma => 2,
        }
    }

    /// Inverse of [`id`](ValueEncoding::id).
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(ValueEncoding::Plain),
            1 => Some(ValueEncoding::Binary),
            2 => Some(ValueEncoding::Gamma),
            _ => None,
        }
    }

    /// Returns `true` if values go through the value table before encoding.
    #[must_use]
    pub fn dedups(self) -> bool {
        !matches!(self, ValueEncoding::Plain)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ValueEncoding::Plain => "plain",
            ValueEncoding::Binary => "binary",
            ValueEncoding::Gamma => "gamma",
        }
    }
}

impl fmt::Display for ValueEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(ValueEncoding::Plain),
            "binary" => Ok(ValueEncoding::Binary),
            "gamma" => Ok(ValueEncoding::Gamma),
            other => Err(ConfigError::UnknownEncoding(other.to_string())),
        }
    }
}

/// Errors produced while assembling or validating a [`MapConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("fp_len {0} exceeds the maximum of {MAX_FP_LEN} bits")]
    FpLenTooLarge(u32),

    #[error("buffer_threshold must be at least 1")]
    ZeroBufferThreshold,

    #[error("partition_count must be at least 1")]
    ZeroPartitionCount,

    #[error("partition_count {0} exceeds the maximum of {MAX_PARTITION_COUNT}")]
    TooManyPartitions(usize),

    #[error("load_factor must be between 1.0 and {MAX_LOAD_FACTOR} (got {0})")]
    InvalidLoadFactor(f64),

    #[error("max_build_attempts must be at least 1")]
    ZeroBuildAttempts,

    #[error("unknown value encoding: {0:?}")]
    UnknownEncoding(String),
}

/// Options fixed at engine construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Seed of the hash family used for partitioning and block seeds.
    pub seed: u64,
    /// Fingerprint bits stored per key; a non-member query is rejected with
    /// probability `1 - 2^-fp_len`. `0` disables suppression.
    pub fp_len: u32,
    /// Number of buffered entries that forces a build.
    pub buffer_threshold: usize,
    /// Number of blocks each generation is split into.
    pub partition_count: usize,
    /// Representation of values inside blocks.
    pub encoding: ValueEncoding,
    /// Slots allocated per key in each block.
    pub load_factor: f64,
    /// Seeds tried per block before a build is reported as failed.
    pub max_build_attempts: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            fp_len: 0,
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
            partition_count: DEFAULT_PARTITION_COUNT,
            encoding: ValueEncoding::default(),
            load_factor: DEFAULT_LOAD_FACTOR,
            max_build_attempts: DEFAULT_MAX_BUILD_ATTEMPTS,
        }
    }
}

impl MapConfig {
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_fp_len(mut self, fp_len: u32) -> Self {
        self.fp_len = fp_len;
        self
    }

    #[must_use]
    pub fn with_buffer_threshold(mut self, threshold: usize) -> Self {
        self.buffer_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_partition_count(mut self, count: usize) -> Self {
        self.partition_count = count;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: ValueEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    #[must_use]
    pub fn with_max_build_attempts(mut self, attempts: u32) -> Self {
        self.max_build_attempts = attempts;
        self
    }

    /// Checks every option against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fp_len > MAX_FP_LEN {
            return Err(ConfigError::FpLenTooLarge(self.fp_len));
        }
        if self.buffer_threshold == 0 {
            return Err(ConfigError::ZeroBufferThreshold);
        }
        if self.partition_count == 0 {
            return Err(ConfigError::ZeroPartitionCount);
        }
        if self.partition_count > MAX_PARTITION_COUNT {
            return Err(ConfigError::TooManyPartitions(self.partition_count));
        }
        if !(1.0..=MAX_LOAD_FACTOR).contains(&self.load_factor) {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        if self.max_build_attempts == 0 {
            return Err(ConfigError::ZeroBuildAttempts);
        }
        Ok(())
    }

    /// Builds a config from `SMAP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Unset or unparsable
    /// values keep their defaults; the result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(raw: Option<String>, default: T) -> T {
            raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
        }

        let defaults = Self::default();
        let cfg = Self {
            seed: parsed(lookup("SMAP_SEED"), defaults.seed),
            fp_len: parsed(lookup("SMAP_FP_LEN"), defaults.fp_len),
            buffer_threshold: parsed(lookup("SMAP_BUFFER"), defaults.buffer_threshold),
            partition_count: parsed(lookup("SMAP_PARTITIONS"), defaults.partition_count),
            encoding: parsed(lookup("SMAP_ENCODING"), defaults.encoding),
            load_factor: parsed(lookup("SMAP_LOAD_FACTOR"), defaults.load_factor),
            max_build_attempts: parsed(
                lookup("SMAP_BUILD_ATTEMPTS"),
                defaults.max_build_attempts,
            ),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
