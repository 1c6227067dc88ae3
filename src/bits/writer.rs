use super::reverse_bits;
use std::io::Write;

/// Bit-level writer for DEFLATE output
///
/// Writes bits LSB-first to match DEFLATE format. Completed bytes collect in an
/// internal buffer until [`BitWriter::drain_to`] hands them to a sink.
pub struct BitWriter {
    /// Completed output bytes
    output: Vec<u8>,
    /// Pending bits, LSB first
    acc: u64,
    /// Number of valid bits in `acc` (0-63)
    acc_bits: u8,
    /// Bytes already drained to a sink
    drained: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_capacity(65536)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { output: Vec::with_capacity(capacity), acc: 0, acc_bits: 0, drained: 0 }
    }

    /// Write `n` bits (0-32) from value in LSB-first order
    #[inline]
    pub fn write_bits(&mut self, value: u32, n: u8) {
        debug_assert!(n <= 32);
        if n == 0 {
            return;
        }
        let masked = (value as u64) & ((1u64 << n) - 1);
        self.acc |= masked << self.acc_bits;
        self.acc_bits += n;
        while self.acc_bits >= 8 {
            self.output.push(self.acc as u8);
            self.acc >>= 8;
            self.acc_bits -= 8;
        }
    }

    /// Write a single bit
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u32, 1);
    }

    /// Write a Huffman code of `length` bits, most significant bit first
    #[inline]
    pub fn write_bits_reversed(&mut self, code: u32, length: u8) {
        self.write_bits(reverse_bits(code, length), length);
    }

    /// Pad to byte boundary with zero bits
    pub fn align_to_byte(&mut self) {
        if self.acc_bits > 0 {
            self.output.push(self.acc as u8);
            self.acc = 0;
            self.acc_bits = 0;
        }
    }

    /// Write a 16-bit little-endian value after aligning
    pub fn write_u16_le(&mut self, value: u16) {
        self.align_to_byte();
        self.output.extend_from_slice(&value.to_le_bytes());
    }

    /// Write raw bytes after aligning
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align_to_byte();
        self.output.extend_from_slice(bytes);
    }

    /// Total bits written so far, drained bytes included
    pub fn bit_position(&self) -> u64 {
        (self.drained + self.output.len() as u64) * 8 + self.acc_bits as u64
    }

    /// Move all completed bytes to `sink`, keeping any partial byte
    pub fn drain_to<W: Write>(&mut self, sink: &mut W) -> std::io::Result<()> {
        if !self.output.is_empty() {
            sink.write_all(&self.output)?;
            self.drained += self.output.len() as u64;
            self.output.clear();
        }
        Ok(())
    }

    /// Pad the last byte and return the buffered output
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.output
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}
