use super::{build_any_seed, numbered_entries, params};
use crate::{Block, BlockSet, BLOCK_HEADER_BITS};
use config::ValueEncoding;
use std::io::{Cursor, ErrorKind};

fn encode_block(block: &Block) -> Vec<u8> {
    let mut buf = Vec::new();
    block.write_to(&mut buf).unwrap();
    buf
}

#[test]
fn block_survives_serialization() {
    let entries = numbered_entries(3_000);
    let block = build_any_seed(&entries, &params(ValueEncoding::Plain, 8));

    let buf = encode_block(&block);
    let loaded = Block::read_from(&mut Cursor::new(&buf)).unwrap();

    assert_eq!(loaded, block);
    for (key, value) in entries.iter().step_by(7) {
        assert_eq!(loaded.get(key), Some(*value));
    }
    assert_eq!(loaded.get(b"missing"), block.get(b"missing"));
}

#[test]
fn empty_block_serializes() {
    let entries: Vec<(Vec<u8>, u64)> = Vec::new();
    let block = Block::try_build(&entries, 42, &params(ValueEncoding::Gamma, 5)).unwrap();
    let buf = encode_block(&block);
    let loaded = Block::read_from(&mut Cursor::new(&buf)).unwrap();

    assert_eq!(loaded, block);
    assert_eq!(loaded.seed(), 42);
    assert_eq!(loaded.fp_len(), 5);
    assert_eq!(loaded.encoding(), ValueEncoding::Gamma);
}

#[test]
fn header_is_fixed_width() {
    let block = build_any_seed(&numbered_entries(10), &params(ValueEncoding::Plain, 0));
    let buf = encode_block(&block);
    // Bytes 24..27 hold encoding, width and fp_len.
    assert_eq!(BLOCK_HEADER_BITS, 27 * 8);
    assert_eq!(buf[24], ValueEncoding::Plain.id());
    assert_eq!(buf[25] as u32, block.value_width());
    assert_eq!(buf[26], 0);
}

#[test]
fn rejects_unknown_encoding() {
    let block = build_any_seed(&numbered_entries(10), &params(ValueEncoding::Plain, 0));
    let mut buf = encode_block(&block);
    buf[24] = 9;
    let err = Block::read_from(&mut Cursor::new(&buf)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn rejects_oversized_widths() {
    let block = build_any_seed(&numbered_entries(10), &params(ValueEncoding::Plain, 4));

    let mut buf = encode_block(&block);
    buf[25] = 65;
    assert_eq!(
        Block::read_from(&mut Cursor::new(&buf)).unwrap_err().kind(),
        ErrorKind::InvalidData
    );

    let mut buf = encode_block(&block);
    buf[26] = 33;
    assert_eq!(
        Block::read_from(&mut Cursor::new(&buf)).unwrap_err().kind(),
        ErrorKind::InvalidData
    );
}

#[test]
fn rejects_mismatched_slot_width() {
    let block = build_any_seed(&numbered_entries(10), &params(ValueEncoding::Plain, 4));
    let mut buf = encode_block(&block);
    // Header says 5-bit fingerprints, slot array holds 4-bit ones.
    buf[26] = 5;
    assert_eq!(
        Block::read_from(&mut Cursor::new(&buf)).unwrap_err().kind(),
        ErrorKind::InvalidData
    );
}

#[test]
fn rejects_key_count_without_segments() {
    let entries: Vec<(Vec<u8>, u64)> = Vec::new();
    let block = Block::try_build(&entries, 1, &params(ValueEncoding::Plain, 0)).unwrap();
    let mut buf = encode_block(&block);
    buf[8..16].copy_from_slice(&5u64.to_le_bytes());
    assert_eq!(
        Block::read_from(&mut Cursor::new(&buf)).unwrap_err().kind(),
        ErrorKind::InvalidData
    );
}

#[test]
fn rejects_more_keys_than_slots() {
    let block = build_any_seed(&numbered_entries(10), &params(ValueEncoding::Plain, 0));
    let mut buf = encode_block(&block);
    buf[8..16].copy_from_slice(&(block.slot_count() + 1).to_le_bytes());
    assert!(Block::read_from(&mut Cursor::new(&buf)).is_err());
}

#[test]
fn truncated_block_is_an_error() {
    let block = build_any_seed(&numbered_entries(100), &params(ValueEncoding::Plain, 8));
    let buf = encode_block(&block);
    for cut in [0, 10, 27, buf.len() / 2, buf.len() - 1] {
        assert!(
            Block::read_from(&mut Cursor::new(&buf[..cut])).is_err(),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn block_set_survives_serialization() {
    let p = params(ValueEncoding::Binary, 6);
    let blocks = vec![
        build_any_seed(&numbered_entries(50), &p),
        Block::empty(9, &p),
        build_any_seed(&numbered_entries(5), &p),
    ];
    let set = BlockSet::from_blocks(blocks);

    let mut buf = Vec::new();
    set.write_to(&mut buf).unwrap();
    let loaded = BlockSet::read_from(&mut Cursor::new(&buf)).unwrap();

    assert_eq!(loaded, set);
    assert_eq!(loaded.partition_count(), 3);
    assert_eq!(loaded.key_count(), 55);
}

#[test]
fn block_set_rejects_zero_partitions() {
    let buf = 0u32.to_le_bytes();
    let err = BlockSet::read_from(&mut Cursor::new(&buf[..])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn block_set_rejects_missing_blocks() {
    let p = params(ValueEncoding::Plain, 0);
    let set = BlockSet::from_blocks(vec![Block::empty(1, &p)]);
    let mut buf = Vec::new();
    set.write_to(&mut buf).unwrap();
    buf[0..4].copy_from_slice(&2u32.to_le_bytes());
    assert!(BlockSet::read_from(&mut Cursor::new(&buf)).is_err());
}

#[test]
fn block_set_with_forged_count_hits_end_of_input() {
    let p = params(ValueEncoding::Plain, 0);
    let set = BlockSet::from_blocks(vec![Block::empty(1, &p)]);
    let mut buf = Vec::new();
    set.write_to(&mut buf).unwrap();
    buf[0..4].copy_from_slice(&(config::MAX_PARTITION_COUNT as u32).to_le_bytes());

    let err = BlockSet::read_from(&mut Cursor::new(&buf)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
}
