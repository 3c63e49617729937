mod format_tests;

use crate::{Block, BlockParams};
use config::ValueEncoding;

/// `n` decimal-string keys mapped to their own index.
pub(crate) fn numbered_entries(n: u64) -> Vec<(Vec<u8>, u64)> {
    (0..n).map(|i| (i.to_string().into_bytes(), i)).collect()
}

pub(crate) fn params(encoding: ValueEncoding, fp_len: u32) -> BlockParams {
    BlockParams {
        fp_len,
        load_factor: config::DEFAULT_LOAD_FACTOR,
        encoding,
    }
}

/// Builds with successive seeds until one peels.
pub(crate) fn build_any_seed(entries: &[(Vec<u8>, u64)], params: &BlockParams) -> Block {
    let mut seed = 1u64;
    for _ in 0..config::DEFAULT_MAX_BUILD_ATTEMPTS {
        match Block::try_build(entries, seed, params) {
            Ok(block) => return block,
            Err(e) if e.is_retryable() => seed = crate::splitmix64(seed),
            Err(e) => panic!("unexpected build error: {}", e),
        }
    }
    panic!("no seed peeled {} keys", entries.len());
}
