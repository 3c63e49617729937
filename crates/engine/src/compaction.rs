/// Compaction: freezes the WriteBuffer (plus replayed deferred writes) into a
/// new generation.
///
/// The new BlockSet is built entirely off to the side. The buffer, the
/// deferred log and the generation list are only touched once every
/// partition has built, so a failure publishes nothing.
use block::{partition_entries, splitmix64, Block, BlockParams, BlockSet};
use tracing::{debug, info, warn};
use writebuf::WriteBuffer;

use crate::{BuildError, Engine, MapError};

/// First seed tried for `partition` of `generation`.
pub(crate) fn initial_seed(base: u64, generation: u64, partition: usize) -> u64 {
    splitmix64(base ^ splitmix64((generation << 32) ^ partition as u64))
}

impl Engine {
    /// Builds the buffered and deferred writes into a new generation.
    ///
    /// A no-op when both the buffer and the deferred log are empty.
    ///
    /// # Steps
    ///
    /// 1. Replay the deferred log into a copy of the buffer. Sequence numbers
    ///    keep a replayed write from shadowing a newer searchable one.
    /// 2. Map values to symbols (value-table codes for coded encodings).
    /// 3. Partition by `partition_hash mod partition_count`.
    /// 4. Build every partition, reseeding up to `max_build_attempts` times.
    /// 5. Clear the deferred log, append the generation, clear the buffer.
    ///
    /// # Errors
    ///
    /// [`MapError::Build`] if a partition exhausts its seeds; the buffer,
    /// deferred log and value table are left as they were. I/O errors from
    /// the deferred log are returned as [`MapError::KeyLog`].
    pub fn compact(&mut self) -> Result<(), MapError> {
        let replayed = self.log.replay_all()?;
        if self.buffer.is_empty() && replayed.is_empty() {
            return Ok(());
        }

        let mut staged: WriteBuffer = self.buffer.clone();
        for record in replayed {
            staged.put(record.key, record.value, record.seq);
        }

        let table_len = self.values.len();
        let set = match self.build_generation(&staged) {
            Ok(set) => set,
            Err(e) => {
                self.values.truncate(table_len);
                return Err(e.into());
            }
        };

        // Clearing the log first means a failure here publishes nothing and
        // the deferred writes are replayed again next time.
        if let Err(e) = self.log.clear() {
            self.values.truncate(table_len);
            return Err(e.into());
        }

        info!(
            "published generation {}: {} keys in {} blocks, {} bits",
            self.generations.len(),
            set.key_count(),
            set.partition_count(),
            set.bit_size()
        );
        self.generations.push(set);
        self.buffer.clear();
        Ok(())
    }

    fn build_generation(&mut self, staged: &WriteBuffer) -> Result<BlockSet, BuildError> {
        let dedup = self.config.encoding.dedups();
        let entries: Vec<(&[u8], u64)> = staged
            .iter()
            .map(|(key, e)| {
                let symbol = if dedup {
                    self.values.code_for(e.value)
                } else {
                    e.value
                };
                (key.as_slice(), symbol)
            })
            .collect();

        let params = BlockParams {
            fp_len: self.config.fp_len,
            load_factor: self.config.load_factor,
            encoding: self.config.encoding,
        };
        let generation = self.generations.len() as u64;
        let parts = partition_entries(entries, self.config.seed, self.config.partition_count);

        let mut blocks = Vec::with_capacity(parts.len());
        for (partition, part) in parts.iter().enumerate() {
            let seed = initial_seed(self.config.seed, generation, partition);
            blocks.push(build_partition(
                part,
                partition,
                seed,
                &params,
                self.config.max_build_attempts,
            )?);
        }
        Ok(BlockSet::from_blocks(blocks))
    }
}

/// Tries successive seeds until the partition peels or the budget runs out.
pub(crate) fn build_partition(
    entries: &[(&[u8], u64)],
    partition: usize,
    mut seed: u64,
    params: &BlockParams,
    max_attempts: u32,
) -> Result<Block, BuildError> {
    let mut attempt = 1;
    loop {
        match Block::try_build(entries, seed, params) {
            Ok(block) => return Ok(block),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                debug!(
                    "partition {} attempt {}/{} failed, reseeding: {}",
                    partition, attempt, max_attempts, e
                );
                seed = splitmix64(seed);
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    "partition {} gave up after {} attempt(s) over {} keys: {}",
                    partition,
                    attempt,
                    entries.len(),
                    e
                );
                return Err(BuildError {
                    partition,
                    keys: entries.len(),
                    attempts: attempt,
                    last: e,
                });
            }
        }
    }
}
