//! Block construction by hypergraph peeling.
//!
//! Every key is a hyperedge over its [`PROBES`] slots. Peeling repeatedly
//! removes a key that is the only one left on some slot and records that slot
//! as the key's pivot. If every key peels, slots are assigned in reverse peel
//! order so that the XOR of a key's three slots equals its encoded value (and
//! the XOR of its three fingerprint slots equals its fingerprint). The pivot
//! is the one slot no later-assigned key touches, so it absorbs the
//! correction. A residual 2-core means the seed is unusable.

use bitarray::SlotArray;
use config::ValueEncoding;
use thiserror::Error;

use crate::codec::ValueCodec;
use crate::keyedge::{KeyEdge, PROBES};
use crate::Block;

/// Extra slots added to every segment. Keeps tiny blocks peelable.
pub const SEGMENT_SLACK: u64 = 8;

/// Parameters shared by every block of a generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockParams {
    /// Fingerprint bits per slot (0 disables suppression).
    pub fp_len: u32,
    /// Slots allocated per key.
    pub load_factor: f64,
    /// Value representation.
    pub encoding: ValueEncoding,
}

/// Why a single construction attempt did not produce a block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TryBuildError {
    /// The key hypergraph has a non-empty 2-core under this seed.
    #[error("hypergraph not peelable with seed {seed:#018x}: {remaining} of {keys} keys left")]
    Unpeelable {
        seed: u64,
        keys: usize,
        remaining: usize,
    },

    /// The largest symbol does not fit the selected encoding.
    #[error("symbol {0} cannot be represented by the selected encoding")]
    Unencodable(u64),

    /// A block indexes keys with 32-bit ids.
    #[error("too many keys for one block: {0}")]
    TooManyKeys(usize),

    /// Probe offsets within a segment are 32-bit.
    #[error("segment length {0} exceeds the 32-bit slot range")]
    SegmentTooLarge(u64),
}

impl TryBuildError {
    /// Returns `true` if retrying with another seed may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TryBuildError::Unpeelable { .. })
    }
}

/// Slots per segment for `keys` keys at `load_factor` slots per key.
#[must_use]
pub fn segment_length(keys: usize, load_factor: f64) -> u64 {
    if keys == 0 {
        return 0;
    }
    // `as` saturates, so absurd load factors land on u64::MAX.
    (((keys as f64 * load_factor) / PROBES as f64).ceil() as u64).saturating_add(SEGMENT_SLACK)
}

impl Block {
    /// Attempts to build a block over `entries` with a single `seed`.
    ///
    /// `entries` pairs each key with its symbol (the raw value for
    /// [`ValueEncoding::Plain`], a value-table code otherwise). Keys must be
    /// unique. This never retries; the caller picks the next seed.
    pub fn try_build<K>(
        entries: &[(K, u64)],
        seed: u64,
        params: &BlockParams,
    ) -> Result<Block, TryBuildError>
    where
        K: AsRef<[u8]>,
    {
        let n = entries.len();
        if n == 0 {
            return Ok(Block::empty(seed, params));
        }
        if n >= u32::MAX as usize {
            return Err(TryBuildError::TooManyKeys(n));
        }

        let max_symbol = entries.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let value_width = params
            .encoding
            .width(max_symbol)
            .ok_or(TryBuildError::Unencodable(max_symbol))?;

        let segment_len = segment_length(n, params.load_factor);
        if segment_len > u32::MAX as u64 {
            return Err(TryBuildError::SegmentTooLarge(segment_len));
        }
        let slots = segment_len * PROBES as u64;

        let edges: Vec<KeyEdge> = entries
            .iter()
            .map(|(k, _)| KeyEdge::new(k.as_ref(), seed, segment_len))
            .collect();

        let order = peel(&edges, slots as usize).map_err(|remaining| {
            TryBuildError::Unpeelable {
                seed,
                keys: n,
                remaining,
            }
        })?;

        let mut values = SlotArray::new(slots, value_width);
        let mut fingerprints = SlotArray::new(slots, params.fp_len);

        for &(key_idx, pivot) in order.iter().rev() {
            let edge = &edges[key_idx as usize];
            let mut v = params.encoding.encode(entries[key_idx as usize].1, value_width);
            let mut f = edge.fingerprint(params.fp_len);
            for &p in edge.positions() {
                if p != pivot {
                    v ^= values.get(p);
                    f ^= fingerprints.get(p);
                }
            }
            values.set(pivot, v);
            fingerprints.set(pivot, f);
        }

        Ok(Block {
            seed,
            key_count: n as u64,
            segment_len,
            encoding: params.encoding,
            value_width,
            fp_len: params.fp_len,
            values,
            fingerprints,
        })
    }
}

/// Peels the hypergraph described by `edges` over `slots` slots.
///
/// Returns `(key index, pivot slot)` in peel order, or the number of keys
/// left in the unpeelable residue.
fn peel(edges: &[KeyEdge], slots: usize) -> Result<Vec<(u32, u64)>, usize> {
    let mut degree = vec![0u32; slots];
    // XOR of the ids of all keys still touching each slot; when the degree
    // drops to 1 this is exactly the remaining key.
    let mut xor_keys = vec![0u32; slots];

    for (i, edge) in edges.iter().enumerate() {
        for &p in edge.positions() {
            degree[p as usize] += 1;
            xor_keys[p as usize] ^= i as u32;
        }
    }

    let mut queue: Vec<u64> = (0..slots as u64)
        .filter(|&p| degree[p as usize] == 1)
        .collect();
    let mut order = Vec::with_capacity(edges.len());

    while let Some(slot) = queue.pop() {
        if degree[slot as usize] != 1 {
            continue;
        }
        let key_idx = xor_keys[slot as usize];
        order.push((key_idx, slot));

        for &p in edges[key_idx as usize].positions() {
            let p = p as usize;
            degree[p] -= 1;
            xor_keys[p] ^= key_idx;
            if degree[p] == 1 {
                queue.push(p as u64);
            }
        }
    }

    if order.len() == edges.len() {
        Ok(order)
    } else {
        Err(edges.len() - order.len())
    }
}
