use crate::bits::{reverse_bits, BitReader};
use crate::error::{Error, Result};
use std::io::Read;

/// Codes up to this length resolve with a single table lookup
const FAST_BITS: u8 = 9;

const MAX_CODE_BITS: u8 = 15;

/// Canonical Huffman decoder
///
/// Short codes go through a direct table indexed by the next `FAST_BITS`
/// stream bits. Longer codes are matched per length against the canonical
/// ranges, reading the next 15 bits most significant first.
pub struct HuffmanDecoder {
    /// `(symbol << 4) | code_length`, zero when no short code matches
    fast: Vec<u16>,
    /// Minimum code length
    /// Maximum code length
    max_bits: u8,
    /// First canonical code of each length
    first_code: [u32; 16],
    /// Number of codes of each length
    count: [u32; 16],
    /// Position in `symbols` of the first code of each length
    first_index: [u32; 16],
    /// Symbols sorted by code length, then by symbol value
    symbols: Vec<u16>,
}

impl HuffmanDecoder {
    /// Build from code lengths (for dynamic Huffman blocks)
    ///
    /// Over-subscribed tables are rejected. Incomplete tables are accepted; a
    /// bit pattern outside the assigned codes fails when decoded.
    pub fn from_code_lengths(lengths: &[u8]) -> Result<Self> {
        let mut bl_count = [0u32; 16];
        for &len in lengths {
            if len > MAX_CODE_BITS {
                return Err(Error::InvalidCodeLength(len));
            }
            bl_count[len as usize] += 1;
        }

        let mut left: i64 = 1;
        for &count in &bl_count[1..] {
            left = (left << 1) - count as i64;
            if left < 0 {
                return Err(Error::HuffmanOversubscribed);
            }
        }

        Ok(Self::build(lengths))
    }

    /// Build a table already known to be valid
    fn build(lengths: &[u8]) -> Self {
        let mut count = [0u32; 16];
        for &len in lengths {
            if len > 0 {
                count[len as usize] += 1;
            }
        }

        let max_bits = (1..16).rev().find(|&i| count[i] > 0).unwrap_or(0) as u8;

        let mut first_code = [0u32; 16];
        let mut first_index = [0u32; 16];
        let mut code = 0u32;
        let mut index = 0u32;
        for bits in 1..16 {
            code = (code + count[bits - 1]) << 1;
            first_code[bits] = code;
            first_index[bits] = index;
            index += count[bits];
        }

        let mut symbols = vec![0u16; index as usize];
        let mut next_index = first_index;
        let mut next_code = first_code;
        let mut fast = vec![0u16; 1 << FAST_BITS];
        for (sym, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let l = len as usize;
            symbols[next_index[l] as usize] = sym as u16;
            next_index[l] += 1;

            if len <= FAST_BITS {
                let entry = ((sym as u16) << 4) | len as u16;
                let mut slot = reverse_bits(next_code[l], len) as usize;
                while slot < fast.len() {
                    fast[slot] = entry;
                    slot += 1 << len;
                }
            }
            next_code[l] += 1;
        }

        Self { fast, max_bits, first_code, count, first_index, symbols }
    }

    /// Build fixed Huffman table for literal/length codes (RFC 1951 section 3.2.6)
    pub fn fixed_literal_length() -> Self {
        Self::build(&super::tables::fixed_literal_lengths())
    }

    /// Build fixed Huffman table for distance codes
    pub fn fixed_distance() -> Self {
        Self::build(&super::tables::fixed_distance_lengths())
    }

    /// Decode next symbol from bitstream
    pub fn decode<R: Read>(&self, bits: &mut BitReader<R>) -> Result<u16> {
        let entry = self.fast[bits.peek_bits(FAST_BITS)? as usize];
        if entry != 0 {
            bits.consume_bits((entry & 0xF) as u8)?;
            return Ok(entry >> 4);
        }

        if self.max_bits > FAST_BITS {
            let value = bits.peek_bits_reversed(MAX_CODE_BITS)?;
            for len in (FAST_BITS + 1)..=self.max_bits {
                let l = len as usize;
                let prefix = value >> (MAX_CODE_BITS - len);
                let offset = prefix.wrapping_sub(self.first_code[l]);
                if offset < self.count[l] {
                    bits.consume_bits(len)?;
                    return Ok(self.symbols[(self.first_index[l] + offset) as usize]);
                }
            }
        }

        Err(Error::InvalidHuffmanCode)
    }
}
