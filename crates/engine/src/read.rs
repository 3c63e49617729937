/// Read path: `get()` plus the size and count queries.
///
/// Point lookups check the WriteBuffer first, then generations from newest
/// to oldest. The first hit wins.
use block::partition_hash;

use crate::Engine;

impl Engine {
    /// Looks up a key, returning the newest value written for it.
    ///
    /// `None` means not found. A key that was never written may still return
    /// a value: with probability about `2^-fp_len` when fingerprints are
    /// enabled, and with no bound when `fp_len` is `0`.
    #[must_use]
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<u64> {
        let key = key.as_ref();

        // 1. Buffer holds the newest data.
        if let Some(value) = self.buffer.get(key) {
            return Some(value);
        }

        // 2. Generations, newest first; one block probed in each.
        let h = partition_hash(key, self.config.seed);
        self.generations
            .iter()
            .rev()
            .find_map(|set| set.get(h, key).and_then(|symbol| self.resolve(symbol)))
    }

    /// Maps a block symbol to the stored value. Codes outside the value
    /// table are treated as a miss.
    pub(crate) fn resolve(&self, symbol: u64) -> Option<u64> {
        if self.config.encoding.dedups() {
            self.values.value(symbol)
        } else {
            Some(symbol)
        }
    }

    /// Footprint in bits: every block across all generations, the value
    /// table, and the write buffer's approximate size.
    #[must_use]
    pub fn get_working_size(&self) -> u64 {
        let blocks: u64 = self.generations.iter().map(|set| set.bit_size()).sum();
        blocks + self.values.bit_size() + self.buffer.approx_bits()
    }

    /// Keys held: every block's construction key count plus buffered
    /// entries. A key rewritten after compaction is counted once per layer
    /// holding it.
    #[must_use]
    pub fn get_key_num(&self) -> u64 {
        let built: u64 = self.generations.iter().map(|set| set.key_count()).sum();
        built + self.buffer.len() as u64
    }
}
