use super::helpers::{key, manual_config};
use crate::*;
use keylog::FileKeyLog;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

/// Operations checked against a `BTreeMap` model of the visible map.
#[derive(Debug, Clone)]
enum Op {
    Searchable(u8, u64),
    Deferred(u8, u64),
    Compact,
    SaveLoad,
    /// Save, drop the engine, then restart on the same log file.
    Reopen,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let k = 0u8..16;
    let op = prop_oneof![
        40 => (k.clone(), any::<u64>()).prop_map(|(k, v)| Op::Searchable(k, v)),
        30 => (k, any::<u64>()).prop_map(|(k, v)| Op::Deferred(k, v)),
        15 => Just(Op::Compact),
        8 => Just(Op::SaveLoad),
        7 => Just(Op::Reopen),
    ];
    prop::collection::vec(op, 0..60)
}

fn small_key(k: u8) -> Vec<u8> {
    format!("k{}", k).into_bytes()
}

fn config_for(encoding: ValueEncoding) -> MapConfig {
    manual_config()
        .with_partition_count(2)
        .with_encoding(encoding)
        .with_fp_len(8)
}

fn engine_on_log(config: MapConfig, log_path: &Path) -> Engine {
    let log = FileKeyLog::open(log_path, false).unwrap();
    Engine::with_key_log(config, Box::new(log)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    #[test]
    fn newest_write_wins_across_compactions_and_restarts(
        ops in ops_strategy(),
        plain in any::<bool>(),
    ) {
        let encoding = if plain { ValueEncoding::Plain } else { ValueEncoding::Binary };
        let dir = tempdir().unwrap();
        let map_path = dir.path().join("map.smap");
        let log_path = dir.path().join("keys.log");

        let mut engine = engine_on_log(config_for(encoding), &log_path);
        let mut visible: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
        let mut pending: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Searchable(k, v) => {
                    engine.set_searchable(small_key(k), v).unwrap();
                    pending.remove(&small_key(k));
                    visible.insert(small_key(k), v);
                }
                Op::Deferred(k, v) => {
                    engine.set_deferred(small_key(k), v).unwrap();
                    pending.insert(small_key(k), v);
                }
                Op::Compact => {
                    engine.compact().unwrap();
                    visible.append(&mut pending);
                }
                Op::SaveLoad => {
                    engine.save(&map_path).unwrap();
                    engine.load(&map_path).unwrap();
                }
                Op::Reopen => {
                    engine.save(&map_path).unwrap();
                    drop(engine);
                    engine = engine_on_log(config_for(encoding), &log_path);
                    engine.load(&map_path).unwrap();
                }
            }

            for (k, v) in &visible {
                prop_assert_eq!(engine.get(k), Some(*v), "key {:?}", String::from_utf8_lossy(k));
            }
        }

        engine.compact().unwrap();
        visible.append(&mut pending);
        for (k, v) in &visible {
            prop_assert_eq!(engine.get(k), Some(*v));
        }
        prop_assert_eq!(engine.buffered_len(), 0);
    }
}

#[test]
fn random_interleaving_over_many_generations() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut engine = Engine::new(config_for(ValueEncoding::Binary)).unwrap();
    let mut visible: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
    let mut pending: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

    for round in 0..12 {
        for _ in 0..400 {
            let k = key(rng.gen_range(0..1_500));
            // Few distinct values so the value table deduplicates.
            let v = rng.gen_range(0..64u64);
            if rng.gen_bool(0.7) {
                engine.set_searchable(k.clone(), v).unwrap();
                pending.remove(&k);
                visible.insert(k, v);
            } else {
                engine.set_deferred(k.clone(), v).unwrap();
                pending.insert(k, v);
            }
        }
        engine.compact().unwrap();
        visible.append(&mut pending);
        assert_eq!(engine.generation_count(), round + 1);
    }

    assert!(engine.value_table().len() <= 64);
    for (k, v) in &visible {
        assert_eq!(engine.get(k), Some(*v));
    }
}
