//! One generation's worth of blocks and the partition function that routes
//! keys between them.
//!
//! `index = partition_hash(seed, key) mod partition_count`. The same seed and
//! count always give the same index, so a key found at build time is only
//! ever queried against the block it was built into.

use crate::Block;

/// Maps a key's partition hash onto `0..partition_count`.
#[inline]
#[must_use]
pub fn partition_index(partition_hash: u64, partition_count: usize) -> usize {
    (partition_hash % partition_count as u64) as usize
}

/// Splits `entries` into `partition_count` lists by [`partition_index`].
///
/// Relative order within each partition follows the input order.
pub fn partition_entries<K, I>(entries: I, seed: u64, partition_count: usize) -> Vec<Vec<(K, u64)>>
where
    K: AsRef<[u8]>,
    I: IntoIterator<Item = (K, u64)>,
{
    let mut parts: Vec<Vec<(K, u64)>> = (0..partition_count).map(|_| Vec::new()).collect();
    for (key, value) in entries {
        let h = crate::partition_hash(key.as_ref(), seed);
        parts[partition_index(h, partition_count)].push((key, value));
    }
    parts
}

/// A fixed array of blocks forming one immutable generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSet {
    pub(crate) blocks: Vec<Block>,
}

impl BlockSet {
    /// Wraps fully built blocks. Block `i` must hold exactly the keys whose
    /// partition index is `i` for `blocks.len()` partitions.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` is empty.
    #[must_use]
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        assert!(!blocks.is_empty(), "a block set needs at least one block");
        Self { blocks }
    }

    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn block(&self, idx: usize) -> Option<&Block> {
        self.blocks.get(idx)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Looks up `key` whose [`partition_hash`](crate::partition_hash) under
    /// the map seed is `partition_hash`. Only the routed block is probed.
    #[must_use]
    pub fn get(&self, partition_hash: u64, key: &[u8]) -> Option<u64> {
        self.blocks[partition_index(partition_hash, self.blocks.len())].get(key)
    }

    /// Keys supplied across all blocks at construction.
    #[must_use]
    pub fn key_count(&self) -> u64 {
        self.blocks.iter().map(Block::key_count).sum()
    }

    /// Sum of every block's [`Block::bit_size`].
    #[must_use]
    pub fn bit_size(&self) -> u64 {
        self.blocks.iter().map(Block::bit_size).sum()
    }
}
