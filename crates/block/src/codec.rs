//! Value codecs: how a symbol (a raw value, or a value-table code) is laid
//! out in a block's value slots.
//!
//! Width is chosen per block from the largest symbol it stores. Decoding a
//! word that no symbol could have produced yields `None`.

use bitarray::{bit_len, low_mask};
pub use config::ValueEncoding;

/// Encoding contract shared by the block builder and block queries.
pub trait ValueCodec {
    /// Slot width needed to hold every symbol `<= max_symbol`, or `None` if
    /// such a symbol cannot be represented in 64 bits.
    fn width(&self, max_symbol: u64) -> Option<u32>;

    /// Encodes `symbol` into a `width`-bit word.
    fn encode(&self, symbol: u64, width: u32) -> u64;

    /// Decodes a `width`-bit word back into a symbol.
    fn decode(&self, word: u64, width: u32) -> Option<u64>;
}

impl ValueCodec for ValueEncoding {
    fn width(&self, max_symbol: u64) -> Option<u32> {
        match self {
            ValueEncoding::Plain | ValueEncoding::Binary => Some(bit_len(max_symbol)),
            ValueEncoding::Gamma => {
                let x = max_symbol.checked_add(1)?;
                let len = 2 * bit_len(x) - 1;
                (len <= 64).then_some(len)
            }
        }
    }

    fn encode(&self, symbol: u64, width: u32) -> u64 {
        match self {
            ValueEncoding::Plain | ValueEncoding::Binary => symbol & low_mask(width),
            ValueEncoding::Gamma => {
                // (n - 1) zero bits followed by the n bits of symbol + 1,
                // left-aligned in the field.
                let x = symbol + 1;
                let len = 2 * bit_len(x) - 1;
                debug_assert!(len <= width, "gamma codeword wider than field");
                x << (width - len)
            }
        }
    }

    fn decode(&self, word: u64, width: u32) -> Option<u64> {
        match self {
            ValueEncoding::Plain | ValueEncoding::Binary => Some(word & low_mask(width)),
            ValueEncoding::Gamma => {
                let word = word & low_mask(width);
                if word == 0 {
                    return None;
                }
                let zeros = width - bit_len(word);
                let n = zeros + 1;
                let len = 2 * n - 1;
                if len > width {
                    return None;
                }
                let pad = width - len;
                if word & low_mask(pad) != 0 {
                    return None;
                }
                Some((word >> pad) - 1)
            }
        }
    }
}
