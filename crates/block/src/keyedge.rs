//! Probe hashing: maps `(seed, key)` to the slots a key occupies inside a
//! block and to the fingerprint used for false-positive suppression.
//!
//! A block's slot array is split into [`PROBES`] equal segments and every key
//! probes exactly one slot in each segment, so the three positions of a key
//! are always distinct.

/// Number of slots probed per key.
pub const PROBES: usize = 3;

/// FNV-1a offset basis, perturbed by the seed for block probes.
const EDGE_BASIS: u64 = 0xcbf29ce484222325;
/// Independent basis for the partition hash.
const PARTITION_BASIS: u64 = 0x517cc1b727220a95;
/// Salt separating fingerprint bits from position bits.
const FINGERPRINT_SALT: u64 = 0xd6e8_feb8_6659_fd93;

/// FNV-1a 64-bit hash with a configurable starting basis.
#[must_use]
pub fn fnv1a_64(data: &[u8], basis: u64) -> u64 {
    const FNV_PRIME: u64 = 0x00000100000001b3;
    let mut hash = basis;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// SplitMix64 finalizer. Also used to derive fresh seeds on retry.
#[inline]
#[must_use]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Seeded 64-bit hash of `key` used for block probes.
#[inline]
#[must_use]
pub fn edge_hash(key: &[u8], seed: u64) -> u64 {
    splitmix64(fnv1a_64(key, EDGE_BASIS ^ splitmix64(seed)))
}

/// Seeded 64-bit hash of `key` used to route it to a block within a
/// generation. Independent of [`edge_hash`] for the same seed.
#[inline]
#[must_use]
pub fn partition_hash(key: &[u8], seed: u64) -> u64 {
    splitmix64(fnv1a_64(key, PARTITION_BASIS ^ splitmix64(seed)))
}

/// Maps a 32-bit hash uniformly onto `0..n` without division.
#[inline]
fn reduce(hash: u32, n: u64) -> u64 {
    ((hash as u64) * n) >> 32
}

/// The probe positions and fingerprint of one key under one seed.
///
/// Never stored: builder and query recompute it from `(seed, key)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEdge {
    positions: [u64; PROBES],
    fingerprint: u64,
}

impl KeyEdge {
    /// Computes the edge of `key` in a block whose segments hold
    /// `segment_len` slots each (`PROBES * segment_len` slots in total).
    ///
    /// # Panics
    ///
    /// Panics if `segment_len` is zero or does not fit in 32 bits.
    #[must_use]
    pub fn new(key: &[u8], seed: u64, segment_len: u64) -> Self {
        assert!(
            segment_len > 0 && segment_len <= u32::MAX as u64,
            "segment length {} out of range",
            segment_len
        );
        let h = edge_hash(key, seed);
        let positions = [
            reduce(h as u32, segment_len),
            segment_len + reduce(h.rotate_left(21) as u32, segment_len),
            2 * segment_len + reduce(h.rotate_left(42) as u32, segment_len),
        ];
        Self {
            positions,
            fingerprint: splitmix64(h ^ FINGERPRINT_SALT),
        }
    }

    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[u64; PROBES] {
        &self.positions
    }

    /// The low `fp_len` bits of the key's fingerprint.
    #[inline]
    #[must_use]
    pub fn fingerprint(&self, fp_len: u32) -> u64 {
        self.fingerprint & bitarray::low_mask(fp_len)
    }
}
