//! # WriteBuffer
//!
//! The mutable front of the map. Searchable writes land here and stay
//! queryable until a compaction freezes them into a new generation.
//!
//! Each entry carries the sequence number of the write that produced it. A
//! put only replaces an entry when its sequence number is strictly newer, so
//! replaying older deferred writes into the buffer never shadows a later
//! searchable write.

use std::collections::BTreeMap;

/// Fixed per-entry overhead counted by [`WriteBuffer::approx_bits`]: the
/// value plus the sequence number.
pub const ENTRY_OVERHEAD_BYTES: usize = 16;

/// A buffered value and the sequence number of the write that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferedValue {
    pub seq: u64,
    pub value: u64,
}

#[derive(Debug, Clone, Default)]
pub struct WriteBuffer {
    map: BTreeMap<Vec<u8>, BufferedValue>,
    key_bytes: usize,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `key` with `seq`. Ignored if the stored entry is at least as new.
    ///
    /// Returns `true` if the buffer changed.
    pub fn put(&mut self, key: Vec<u8>, value: u64, seq: u64) -> bool {
        match self.map.get_mut(&key) {
            Some(old) if old.seq >= seq => false,
            Some(old) => {
                *old = BufferedValue { seq, value };
                true
            }
            None => {
                self.key_bytes += key.len();
                self.map.insert(key, BufferedValue { seq, value });
                true
            }
        }
    }

    /// Latest value for `key`.
    pub fn get(&self, key: &[u8]) -> Option<u64> {
        self.map.get(key).map(|e| e.value)
    }

    pub fn get_entry(&self, key: &[u8]) -> Option<&BufferedValue> {
        self.map.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &BufferedValue)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.key_bytes = 0;
    }

    /// Total bytes of buffered keys.
    pub fn key_bytes(&self) -> usize {
        self.key_bytes
    }

    /// Approximate footprint in bytes: key bytes plus
    /// [`ENTRY_OVERHEAD_BYTES`] per entry.
    pub fn approx_size(&self) -> usize {
        self.key_bytes + self.map.len() * ENTRY_OVERHEAD_BYTES
    }

    pub fn approx_bits(&self) -> u64 {
        self.approx_size() as u64 * 8
    }
}
