//! Block and block-set binary format.
//!
//! ## Block
//!
//! ```text
//! [seed: u64][key_count: u64][segment_len: u64]
//! [encoding: u8][value_width: u8][fp_len: u8]
//! [value slots: SlotArray][fingerprint slots: SlotArray]
//! ```
//!
//! ## BlockSet
//!
//! ```text
//! [partition_count: u32][Block] * partition_count
//! ```
//!
//! All integers are little-endian. Loading restores the stored slots and seed
//! directly; the construction algorithm is never re-run.

use bitarray::SlotArray;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use config::{ValueEncoding, MAX_FP_LEN, MAX_PARTITION_COUNT};
use std::io::{self, Read, Write};

use crate::keyedge::PROBES;
use crate::{Block, BlockSet};

/// Size of the fixed block header in bits.
pub const BLOCK_HEADER_BITS: u64 = (8 + 8 + 8 + 1 + 1 + 1) * 8;

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

impl Block {
    /// Serializes the block.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.seed)?;
        w.write_u64::<LittleEndian>(self.key_count)?;
        w.write_u64::<LittleEndian>(self.segment_len)?;
        w.write_u8(self.encoding.id())?;
        w.write_u8(self.value_width as u8)?;
        w.write_u8(self.fp_len as u8)?;
        self.values.write_to(w)?;
        self.fingerprints.write_to(w)?;
        Ok(())
    }

    /// Deserializes a block, rejecting any header or slot array that could
    /// not have come from [`Block::try_build`].
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let seed = r.read_u64::<LittleEndian>()?;
        let key_count = r.read_u64::<LittleEndian>()?;
        let segment_len = r.read_u64::<LittleEndian>()?;
        let encoding_id = r.read_u8()?;
        let value_width = r.read_u8()? as u32;
        let fp_len = r.read_u8()? as u32;

        let encoding = ValueEncoding::from_id(encoding_id)
            .ok_or_else(|| invalid(format!("unknown encoding id {}", encoding_id)))?;
        if value_width > 64 {
            return Err(invalid(format!("value width {} exceeds 64", value_width)));
        }
        if fp_len > MAX_FP_LEN {
            return Err(invalid(format!("fp_len {} exceeds {}", fp_len, MAX_FP_LEN)));
        }
        if segment_len > u32::MAX as u64 {
            return Err(invalid(format!("segment length {} too large", segment_len)));
        }
        if (key_count == 0) != (segment_len == 0) {
            return Err(invalid(format!(
                "block with {} keys has segment length {}",
                key_count, segment_len
            )));
        }

        let slots = segment_len * PROBES as u64;
        if key_count > slots {
            return Err(invalid(format!(
                "block claims {} keys in {} slots",
                key_count, slots
            )));
        }

        let values = SlotArray::read_from(r)?;
        let fingerprints = SlotArray::read_from(r)?;
        if values.slots() != slots || values.width() != value_width {
            return Err(invalid(format!(
                "value slots {}x{} do not match header {}x{}",
                values.slots(),
                values.width(),
                slots,
                value_width
            )));
        }
        if fingerprints.slots() != slots || fingerprints.width() != fp_len {
            return Err(invalid(format!(
                "fingerprint slots {}x{} do not match header {}x{}",
                fingerprints.slots(),
                fingerprints.width(),
                slots,
                fp_len
            )));
        }

        Ok(Block {
            seed,
            key_count,
            segment_len,
            encoding,
            value_width,
            fp_len,
            values,
            fingerprints,
        })
    }
}

impl BlockSet {
    /// Serializes the partition count followed by every block in order.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
        for block in &self.blocks {
            block.write_to(w)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let count = r.read_u32::<LittleEndian>()?;
        if count == 0 || count as usize > MAX_PARTITION_COUNT {
            return Err(invalid(format!("invalid partition count {}", count)));
        }
        // Every block takes at least a header's worth of input, so grow with
        // what parses rather than trusting `count`.
        let mut blocks = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            blocks.push(Block::read_from(r)?);
        }
        Ok(BlockSet { blocks })
    }
}
