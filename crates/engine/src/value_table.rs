//! Value deduplication for the `Binary` and `Gamma` encodings.
//!
//! Blocks store a small code per key instead of the value itself. Code `c`
//! resolves to the `c`-th distinct value ever inserted. The table only grows,
//! except that a failed compaction rolls back the codes it assigned.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{self, Read, Write};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueTable {
    values: Vec<u64>,
    codes: HashMap<u64, u64>,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Code for `value`, assigning the next free code on first sight.
    pub fn code_for(&mut self, value: u64) -> u64 {
        if let Some(&code) = self.codes.get(&value) {
            return code;
        }
        let code = self.values.len() as u64;
        self.values.push(value);
        self.codes.insert(value, code);
        code
    }

    pub fn lookup_code(&self, value: u64) -> Option<u64> {
        self.codes.get(&value).copied()
    }

    /// Value behind `code`, or `None` for a code never assigned.
    pub fn value(&self, code: u64) -> Option<u64> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.values.get(idx))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forgets every code `>= len`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.values.len() {
            return;
        }
        for value in self.values.drain(len..) {
            self.codes.remove(&value);
        }
    }

    /// Values in code order.
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// In-memory footprint counted by the engine: one `u64` per value.
    pub fn bit_size(&self) -> u64 {
        self.values.len() as u64 * 64
    }

    /// `[count: u64][value: u64] * count`
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.values.len() as u64)?;
        for &v in &self.values {
            w.write_u64::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Reads a table of at most `max_count` values. Duplicate values are
    /// rejected since they could not have come from [`ValueTable::code_for`].
    pub fn read_from<R: Read>(r: &mut R, max_count: u64) -> io::Result<Self> {
        let count = r.read_u64::<LittleEndian>()?;
        if count > max_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("value table of {} entries exceeds input", count),
            ));
        }
        let mut table = ValueTable::new();
        for _ in 0..count {
            let v = r.read_u64::<LittleEndian>()?;
            if table.codes.contains_key(&v) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("duplicate value {} in value table", v),
                ));
            }
            table.code_for(v);
        }
        Ok(table)
    }
}
