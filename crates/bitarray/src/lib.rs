//! # Bit Array
//!
//! Dense bit storage used by succinct map blocks.
//!
//! [`BitArray`] addresses raw bit offsets and reads or writes runs of up to
//! 64 bits that may straddle a word boundary. [`SlotArray`] layers a fixed
//! slot width on top so that callers work with logical slot indices and never
//! compute bit offsets themselves.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bitarray::SlotArray;
//!
//! let mut slots = SlotArray::new(10, 5);
//! slots.set(3, 0b10110);
//! assert_eq!(slots.get(3), 0b10110);
//! ```
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Safety cap for deserialization: a single array may not exceed 1 GiB.
const MAX_WORDS: u64 = (1024 * 1024 * 1024) / 8;

/// Words decoded per read. Storage grows with the bytes actually present, so
/// a forged word count fails at end of input instead of allocating first.
const READ_CHUNK_WORDS: usize = 4096;

/// Returns a mask with the low `width` bits set (`width <= 64`).
#[inline]
#[must_use]
pub fn low_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Number of bits needed to represent `v` (`0` for `v == 0`).
#[inline]
#[must_use]
pub fn bit_len(v: u64) -> u32 {
    64 - v.leading_zeros()
}

/// A fixed-length array of bits backed by `u64` words.
#[derive(Clone, PartialEq, Eq)]
pub struct BitArray {
    words: Vec<u64>,
    len_bits: u64,
}

impl BitArray {
    /// Creates a zeroed array of `len_bits` bits.
    pub fn new(len_bits: u64) -> Self {
        let word_count = len_bits.div_ceil(64) as usize;
        Self {
            words: vec![0u64; word_count],
            len_bits,
        }
    }

    /// Number of addressable bits.
    #[must_use]
    pub fn len_bits(&self) -> u64 {
        self.len_bits
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len_bits == 0
    }

    /// Reads `width` bits starting at bit offset `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `width > 64` or the run extends past the end of the array.
    #[must_use]
    pub fn get_bits(&self, pos: u64, width: u32) -> u64 {
        if width == 0 {
            return 0;
        }
        self.check_range(pos, width);

        let word = (pos / 64) as usize;
        let off = (pos % 64) as u32;
        let mut v = self.words[word] >> off;
        if off + width > 64 {
            v |= self.words[word + 1] << (64 - off);
        }
        v & low_mask(width)
    }

    /// Overwrites `width` bits starting at bit offset `pos` with the low
    /// `width` bits of `value`.
    ///
    /// # Panics
    ///
    /// Panics if `width > 64` or the run extends past the end of the array.
    pub fn set_bits(&mut self, pos: u64, width: u32, value: u64) {
        if width == 0 {
            return;
        }
        self.check_range(pos, width);

        let value = value & low_mask(width);
        let word = (pos / 64) as usize;
        let off = (pos % 64) as u32;

        let lo_mask = low_mask(width) << off;
        self.words[word] = (self.words[word] & !lo_mask) | (value << off);

        if off + width > 64 {
            let spill = off + width - 64;
            let hi = value >> (64 - off);
            self.words[word + 1] = (self.words[word + 1] & !low_mask(spill)) | hi;
        }
    }

    /// Size of the serialized array in bytes.
    ///
    /// Layout: `len_bits(u64) + word_count(u64) + words`.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        8 + 8 + self.words.len() * 8
    }

    /// Serializes the array.
    ///
    /// Wire format (all little-endian):
    /// ```text
    /// [len_bits: u64][word_count: u64][words: u64 * word_count]
    /// ```
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.len_bits)?;
        w.write_u64::<LittleEndian>(self.words.len() as u64)?;
        for &word in &self.words {
            w.write_u64::<LittleEndian>(word)?;
        }
        Ok(())
    }

    /// Deserializes an array written by [`write_to`](BitArray::write_to).
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let len_bits = r.read_u64::<LittleEndian>()?;
        let word_count = r.read_u64::<LittleEndian>()?;

        if word_count > MAX_WORDS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bit array too large: {} words", word_count),
            ));
        }
        if word_count != len_bits.div_ceil(64) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "bit array word count {} does not match length {} bits",
                    word_count, len_bits
                ),
            ));
        }

        let mut words = Vec::with_capacity((word_count as usize).min(READ_CHUNK_WORDS));
        let mut chunk = [0u64; READ_CHUNK_WORDS];
        let mut left = word_count as usize;
        while left > 0 {
            let n = left.min(READ_CHUNK_WORDS);
            r.read_u64_into::<LittleEndian>(&mut chunk[..n])?;
            words.extend_from_slice(&chunk[..n]);
            left -= n;
        }

        Ok(Self { words, len_bits })
    }

    fn check_range(&self, pos: u64, width: u32) {
        assert!(width <= 64, "bit run wider than 64 bits: {}", width);
        assert!(
            pos.checked_add(width as u64)
                .is_some_and(|end| end <= self.len_bits),
            "bit run {}..{} out of bounds (len {})",
            pos,
            pos.saturating_add(width as u64),
            self.len_bits
        );
    }
}

impl std::fmt::Debug for BitArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitArray")
            .field("len_bits", &self.len_bits)
            .field("words", &self.words.len())
            .finish()
    }
}

/// An array of `slots` unsigned integers, each exactly `width` bits wide.
///
/// A width of zero is allowed: every slot reads as `0` and no storage is used.
#[derive(Clone, PartialEq, Eq)]
pub struct SlotArray {
    bits: BitArray,
    slots: u64,
    width: u32,
}

impl SlotArray {
    /// Creates `slots` zeroed slots of `width` bits.
    ///
    /// # Panics
    ///
    /// Panics if `width > 64` or the total size overflows `u64`.
    pub fn new(slots: u64, width: u32) -> Self {
        assert!(width <= 64, "slot width must be <= 64 (got {})", width);
        let len_bits = slots
            .checked_mul(width as u64)
            .unwrap_or_else(|| panic!("slot array of {} x {} bits overflows u64", slots, width));
        Self {
            bits: BitArray::new(len_bits),
            slots,
            width,
        }
    }

    #[must_use]
    pub fn slots(&self) -> u64 {
        self.slots
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Storage used by the slot contents, in bits.
    #[must_use]
    pub fn bit_len(&self) -> u64 {
        self.bits.len_bits()
    }

    /// Reads slot `idx`.
    #[inline]
    #[must_use]
    pub fn get(&self, idx: u64) -> u64 {
        assert!(idx < self.slots, "slot {} out of bounds ({})", idx, self.slots);
        self.bits.get_bits(idx * self.width as u64, self.width)
    }

    /// Overwrites slot `idx` with the low `width` bits of `value`.
    #[inline]
    pub fn set(&mut self, idx: u64, value: u64) {
        assert!(idx < self.slots, "slot {} out of bounds ({})", idx, self.slots);
        self.bits.set_bits(idx * self.width as u64, self.width, value);
    }

    /// Serializes the slot array.
    ///
    /// Wire format: `[slots: u64][width: u8][BitArray]`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.slots)?;
        w.write_u8(self.width as u8)?;
        self.bits.write_to(w)
    }

    /// Deserializes a slot array, checking that the stored bit length matches
    /// `slots * width`.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let slots = r.read_u64::<LittleEndian>()?;
        let width = r.read_u8()? as u32;
        if width > 64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("slot width {} exceeds 64", width),
            ));
        }
        let bits = BitArray::read_from(r)?;
        if slots.checked_mul(width as u64) != Some(bits.len_bits()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "slot array of {} x {} bits stored with {} bits",
                    slots,
                    width,
                    bits.len_bits()
                ),
            ));
        }
        Ok(Self { bits, slots, width })
    }
}

impl std::fmt::Debug for SlotArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotArray")
            .field("slots", &self.slots)
            .field("width", &self.width)
            .finish()
    }
}
