/// Write path: `set_searchable()`, `set_deferred()` and `reconfigure()`.
///
/// Every write takes the next sequence number. Searchable writes are applied
/// to the WriteBuffer and may trigger a compaction; deferred writes only
/// reach the KeyLog and become searchable after the next compaction.
use keylog::LogRecord;
use tracing::debug;

use crate::{Engine, MapConfig, MapError, MAX_KEY_SIZE};

impl Engine {
    /// Inserts a key that is searchable as soon as this returns.
    ///
    /// A later write for the same key shadows this one. If the buffer reaches
    /// the configured threshold, the buffer is compacted before returning;
    /// a failed build is returned and leaves the write in the buffer.
    pub fn set_searchable<K: Into<Vec<u8>>>(&mut self, key: K, value: u64) -> Result<(), MapError> {
        let key = key.into();
        check_key(&key)?;
        let seq = self.next_seq()?;

        self.buffer.put(key, value, seq);

        if self.buffer.len() >= self.config.buffer_threshold {
            debug!(
                "write buffer reached {} entries, compacting",
                self.buffer.len()
            );
            self.compact()?;
        }
        Ok(())
    }

    /// Appends a write to the deferred log only. It is not visible to
    /// [`Engine::get`] until the next [`Engine::compact`].
    pub fn set_deferred<K: Into<Vec<u8>>>(&mut self, key: K, value: u64) -> Result<(), MapError> {
        let key = key.into();
        check_key(&key)?;
        let seq = self.next_seq()?;

        self.log.append(&LogRecord { seq, key, value })?;
        Ok(())
    }

    /// Replaces the configuration, for example to retry a failed compaction
    /// with a lower load or more seed attempts.
    ///
    /// Existing generations route keys by `seed` and resolve symbols by
    /// `encoding`, so those two may only change while no generation exists.
    pub fn reconfigure(&mut self, config: MapConfig) -> Result<(), MapError> {
        config.validate()?;
        if !self.generations.is_empty() {
            if config.seed != self.config.seed {
                return Err(MapError::Reconfigure("seed"));
            }
            if config.encoding != self.config.encoding {
                return Err(MapError::Reconfigure("encoding"));
            }
        }
        self.config = config;
        Ok(())
    }

    fn next_seq(&mut self) -> Result<u64, MapError> {
        self.seq = self.seq.checked_add(1).ok_or(MapError::SequenceOverflow)?;
        Ok(self.seq)
    }
}

fn check_key(key: &[u8]) -> Result<(), MapError> {
    if key.len() > MAX_KEY_SIZE {
        return Err(MapError::KeyTooLarge {
            len: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}
