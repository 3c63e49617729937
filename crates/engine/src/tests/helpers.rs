use crate::{Engine, MapConfig, ValueEncoding};

/// A config that never compacts on its own.
pub fn manual_config() -> MapConfig {
    MapConfig::default()
        .with_buffer_threshold(usize::MAX)
        .with_partition_count(4)
}

pub fn engine_with(encoding: ValueEncoding, fp_len: u32) -> Engine {
    Engine::new(manual_config().with_encoding(encoding).with_fp_len(fp_len)).unwrap()
}

/// Decimal-string key for `i`.
pub fn key(i: u64) -> Vec<u8> {
    i.to_string().into_bytes()
}
