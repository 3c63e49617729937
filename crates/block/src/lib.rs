//! # Block - Immutable Succinct Key/Value Blocks
//!
//! A [`Block`] maps a fixed set of keys to integer symbols without storing the
//! keys. It is built once by [`Block::try_build`] and never modified; queries
//! touch exactly three slots.
//!
//! A [`BlockSet`] is one generation of the map: `partition_count` blocks, with
//! every key routed to a single block by [`partition_index`].
//!
//! ## Block layout
//!
//! ```text
//! ┌──────────────── segment 0 ────────┬──── segment 1 ────┬──── segment 2 ────┐
//! │ value slots     (value_width bits each, 3 * segment_len slots)            │
//! ├───────────────────────────────────────────────────────────────────────────┤
//! │ fingerprint slots (fp_len bits each, same slot count; absent if fp_len=0) │
//! └───────────────────────────────────────────────────────────────────────────┘
//!
//! query(key):
//!   (p0, p1, p2, fp) = KeyEdge(seed, key)
//!   value = V[p0] ^ V[p1] ^ V[p2]
//!   reject if F[p0] ^ F[p1] ^ F[p2] != fp
//! ```
//!
//! A key that was not in the build set lands on three arbitrary slots, so
//! without fingerprints its lookup returns an arbitrary symbol. With `fp_len`
//! fingerprint bits that happens with probability about `2^-fp_len`.

mod builder;
mod codec;
mod format;
mod keyedge;
mod set;

use bitarray::SlotArray;
use config::ValueEncoding;

pub use builder::{segment_length, BlockParams, TryBuildError, SEGMENT_SLACK};
pub use codec::ValueCodec;
pub use format::BLOCK_HEADER_BITS;
pub use keyedge::{edge_hash, fnv1a_64, partition_hash, splitmix64, KeyEdge, PROBES};
pub use set::{partition_entries, partition_index, BlockSet};

/// An immutable succinct map over a fixed key set.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    /// Seed the block was successfully built with.
    seed: u64,
    /// Number of keys supplied at construction.
    key_count: u64,
    /// Slots per segment; `0` only for an empty block.
    segment_len: u64,
    encoding: ValueEncoding,
    value_width: u32,
    fp_len: u32,
    values: SlotArray,
    fingerprints: SlotArray,
}

impl Block {
    /// A block holding no keys. Every lookup misses.
    #[must_use]
    pub fn empty(seed: u64, params: &BlockParams) -> Self {
        Self {
            seed,
            key_count: 0,
            segment_len: 0,
            encoding: params.encoding,
            value_width: 0,
            fp_len: params.fp_len,
            values: SlotArray::new(0, 0),
            fingerprints: SlotArray::new(0, params.fp_len),
        }
    }

    /// Looks up `key`, returning its symbol.
    ///
    /// Returns `None` if the fingerprint check or the codec rejects the slots.
    /// A key outside the build set may still return `Some` (a false positive).
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<u64> {
        if self.key_count == 0 {
            return None;
        }

        let edge = KeyEdge::new(key, self.seed, self.segment_len);
        let mut v = 0u64;
        let mut f = 0u64;
        for &p in edge.positions() {
            v ^= self.values.get(p);
            f ^= self.fingerprints.get(p);
        }

        if f != edge.fingerprint(self.fp_len) {
            return None;
        }
        self.encoding.decode(v, self.value_width)
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key_count == 0
    }

    #[must_use]
    pub fn segment_len(&self) -> u64 {
        self.segment_len
    }

    #[must_use]
    pub fn encoding(&self) -> ValueEncoding {
        self.encoding
    }

    #[must_use]
    pub fn value_width(&self) -> u32 {
        self.value_width
    }

    #[must_use]
    pub fn fp_len(&self) -> u32 {
        self.fp_len
    }

    /// Total slots across all segments.
    #[must_use]
    pub fn slot_count(&self) -> u64 {
        self.values.slots()
    }

    /// Memory footprint in bits: slot contents plus the fixed header.
    #[must_use]
    pub fn bit_size(&self) -> u64 {
        BLOCK_HEADER_BITS + self.values.bit_len() + self.fingerprints.bit_len()
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("seed", &format_args!("{:#018x}", self.seed))
            .field("key_count", &self.key_count)
            .field("segment_len", &self.segment_len)
            .field("encoding", &self.encoding)
            .field("value_width", &self.value_width)
            .field("fp_len", &self.fp_len)
            .field("bit_size", &self.bit_size())
            .finish()
    }
}

#[cfg(test)]
mod tests;
