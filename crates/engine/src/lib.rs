//! # Engine - Succinct Key/Value Map
//!
//! Ties the [`writebuf`], [`keylog`] and [`block`] crates into a map from
//! byte-string keys to `u64` values that uses a few bits per key once built.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────────┐
//! │                     ENGINE                        │
//! │                                                   │
//! │ set_searchable → WriteBuffer                      │
//! │ set_deferred   → KeyLog                           │
//! │              |                                    │
//! │              |  (buffer full, or explicit call)   │
//! │              v                                    │
//! │ compact() → replay KeyLog + WriteBuffer           │
//! │           → partition → Block per partition       │
//! │           → new BlockSet appended (generation)    │
//! │                                                   │
//! │ get → WriteBuffer → generations newest..oldest    │
//! │        (first match wins)                         │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module          | Purpose                                             |
//! |-----------------|-----------------------------------------------------|
//! | `lib.rs`        | `Engine` struct, constructors, accessors, `Debug`   |
//! | [`write`]       | `set_searchable()`, `set_deferred()`, `reconfigure()` |
//! | [`read`]        | `get()`, `get_working_size()`, `get_key_num()`      |
//! | [`compaction`]  | `compact()` with bounded reseeding per partition    |
//! | [`persist`]     | `save()` / `load()`                                 |
//! | [`value_table`] | value deduplication for coded encodings             |
//!
//! ## Generations
//!
//! ```text
//! ┌────────────────────────────┐  ← freshest, checked first
//! │ WRITE BUFFER               │
//! ├────────────────────────────┤
//! │ generation N-1 (BlockSet)  │
//! │ ...                        │
//! │ generation 0   (BlockSet)  │
//! └────────────────────────────┘
//! ```
//!
//! Generations never change once appended. A lookup that reaches them
//! computes the key's partition hash once and probes one block per
//! generation.
//!
//! Lookups of keys that were never written return `None` with probability
//! about `1 - 2^-fp_len`; otherwise they return an arbitrary stored value.

mod compaction;
mod error;
mod persist;
mod read;
mod value_table;
mod write;

use block::BlockSet;
use keylog::{KeyLog, MemKeyLog};
use tracing::debug;
use writebuf::WriteBuffer;

pub use config::{MapConfig, ValueEncoding};
pub use error::{BuildError, MapError};
pub use persist::{FORMAT_VERSION, MAGIC};
pub use value_table::ValueTable;

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// The map.
///
/// # Write Path
///
/// 1. Increment the monotonic sequence number.
/// 2. Searchable writes go to the WriteBuffer; deferred writes go to the
///    KeyLog only.
/// 3. When the buffer holds `buffer_threshold` entries, [`Engine::compact`]
///    runs before the write returns.
///
/// # Read Path
///
/// 1. Check the WriteBuffer.
/// 2. Check generations from newest to oldest, one block each.
/// 3. First match wins.
pub struct Engine {
    pub(crate) config: MapConfig,
    pub(crate) buffer: WriteBuffer,
    pub(crate) log: Box<dyn KeyLog>,
    /// Oldest first.
    pub(crate) generations: Vec<BlockSet>,
    pub(crate) values: ValueTable,
    /// Last sequence number handed out.
    pub(crate) seq: u64,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("seq", &self.seq)
            .field("config", &self.config)
            .field("buffered_entries", &self.buffer.len())
            .field("generation_count", &self.generations.len())
            .field("value_table_len", &self.values.len())
            .field("key_num", &self.get_key_num())
            .field("working_size_bits", &self.get_working_size())
            .finish()
    }
}

impl Engine {
    /// Creates an empty map with an in-memory deferred log.
    pub fn new(config: MapConfig) -> Result<Self, MapError> {
        Self::with_key_log(config, Box::new(MemKeyLog::new()))
    }

    /// Creates an empty map that defers writes to `log`.
    ///
    /// Records already in `log` are picked up by the next compaction. The
    /// sequence counter starts after the highest one they carry, so new
    /// writes always outrank them.
    pub fn with_key_log(config: MapConfig, mut log: Box<dyn KeyLog>) -> Result<Self, MapError> {
        config.validate()?;
        let seq = log.max_seq()?;
        if seq > 0 {
            debug!("deferred log holds records up to seq {}", seq);
        }
        Ok(Self {
            config,
            buffer: WriteBuffer::new(),
            log,
            generations: Vec::new(),
            values: ValueTable::new(),
            seq,
        })
    }

    #[must_use]
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    #[must_use]
    pub fn fp_len(&self) -> u32 {
        self.config.fp_len
    }

    #[must_use]
    pub fn encoding(&self) -> ValueEncoding {
        self.config.encoding
    }

    /// Returns the current monotonic sequence number.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn generation_count(&self) -> usize {
        self.generations.len()
    }

    /// Entries currently searchable from the write buffer.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn value_table(&self) -> &ValueTable {
        &self.values
    }

    /// Bit size of every block, per generation, oldest generation first.
    #[must_use]
    pub fn generation_block_sizes(&self) -> Vec<Vec<u64>> {
        self.generations
            .iter()
            .map(|set| set.blocks().map(|b| b.bit_size()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests;
