use super::reverse_bits;
use crate::error::{Error, Result};
use std::io::Read;

/// Bit-level reader for DEFLATE streams
///
/// DEFLATE uses LSB-first bit ordering within bytes.
/// Bits are read from LSB to MSB within each byte.
///
/// Peeking is allowed to run past the end of the source (missing bits read as
/// zero) so that a short final Huffman code can be looked up with a full-width
/// peek; consuming bits that were never delivered is an error.
pub struct BitReader<R: Read> {
    reader: R,
    /// Buffer holding up to 64 bits
    buffer: u64,
    /// Number of valid bits in buffer (0-64)
    bits_available: u8,
    /// Total bytes pulled from the source
    bytes_read: u64,
    /// Source returned a zero-length read
    eof: bool,
}

impl<R: Read> BitReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buffer: 0, bits_available: 0, bytes_read: 0, eof: false }
    }

    /// Try to get at least `n` bits into the buffer.
    ///
    /// Reads up to 8 bytes at once. Returns `false` when the source ended first.
    fn refill(&mut self, n: u8) -> Result<bool> {
        debug_assert!(n <= 57, "Cannot request more than 57 bits at once");

        while self.bits_available < n {
            if self.eof {
                return Ok(false);
            }
            let room = ((64 - self.bits_available) / 8) as usize;
            let mut chunk = [0u8; 8];
            match self.reader.read(&mut chunk[..room]) {
                Ok(0) => self.eof = true,
                Ok(count) => {
                    for &byte in &chunk[..count] {
                        self.buffer |= (byte as u64) << self.bits_available;
                        self.bits_available += 8;
                    }
                    self.bytes_read += count as u64;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(true)
    }

    /// Read `n` bits (0-32) in LSB-first order (standard DEFLATE order)
    pub fn read_bits(&mut self, n: u8) -> Result<u32> {
        debug_assert!(n <= 32, "Cannot read more than 32 bits at once");

        if n == 0 {
            return Ok(0);
        }
        if !self.refill(n)? {
            return Err(Error::UnexpectedEof);
        }

        let result = (self.buffer & ((1u64 << n) - 1)) as u32;
        self.buffer >>= n;
        self.bits_available -= n;
        Ok(result)
    }

    /// Peek at `n` bits without consuming them; bits past the end read as zero
    #[inline]
    pub fn peek_bits(&mut self, n: u8) -> Result<u32> {
        debug_assert!(n <= 32, "Cannot peek more than 32 bits at once");

        if n == 0 {
            return Ok(0);
        }
        self.refill(n)?;
        Ok((self.buffer & ((1u64 << n) - 1)) as u32)
    }

    /// Peek at `n` bits with the first stream bit as the most significant one
    ///
    /// Huffman codes are packed starting with their most significant bit, so
    /// this yields the code value directly.
    #[inline]
    pub fn peek_bits_reversed(&mut self, n: u8) -> Result<u32> {
        Ok(reverse_bits(self.peek_bits(n)?, n))
    }

    /// Consume `n` bits that were previously peeked
    #[inline]
    pub fn consume_bits(&mut self, n: u8) -> Result<()> {
        if n > self.bits_available {
            return Err(Error::UnexpectedEof);
        }
        self.buffer >>= n;
        self.bits_available -= n;
        Ok(())
    }

    /// Read a single bit
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Discard remaining bits in current byte, align to next byte boundary
    pub fn align_to_byte(&mut self) {
        let discard = self.bits_available % 8;
        if discard > 0 {
            self.buffer >>= discard;
            self.bits_available -= discard;
        }
    }

    /// Read a 16-bit little-endian value (aligns to byte boundary first)
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.align_to_byte();
        let lo = self.read_bits(8)? as u16;
        let hi = self.read_bits(8)? as u16;
        Ok(lo | (hi << 8))
    }

    /// Fill `buf` with raw bytes (aligns to byte boundary first)
    ///
    /// Buffered bytes are drained before reading straight from the source.
    pub fn read_aligned(&mut self, buf: &mut [u8]) -> Result<()> {
        self.align_to_byte();
        let mut filled = 0;
        while filled < buf.len() && self.bits_available >= 8 {
            buf[filled] = self.buffer as u8;
            self.buffer >>= 8;
            self.bits_available -= 8;
            filled += 1;
        }
        if filled < buf.len() {
            match self.reader.read_exact(&mut buf[filled..]) {
                Ok(()) => self.bytes_read += (buf.len() - filled) as u64,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(Error::UnexpectedEof);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    /// Bytes of the source actually consumed by the bitstream
    ///
    /// A partially consumed byte counts as consumed.
    pub fn consumed_bytes(&self) -> u64 {
        self.bytes_read - (self.bits_available / 8) as u64
    }

    /// Get the inner reader (consumes self)
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits() {
        // Binary: 11010011 10101010 = 0xD3 0xAA
        let data = vec![0xD3, 0xAA];
        let mut reader = BitReader::new(data.as_slice());

        // bits 0-2: 011 = 3
        assert_eq!(reader.read_bits(3).unwrap(), 0b011);
        // bits 3-7: 11010 = 26
        assert_eq!(reader.read_bits(5).unwrap(), 0b11010);
        // next byte
        assert_eq!(reader.read_bits(8).unwrap(), 0xAA);
    }

    #[test]
    fn test_read_bit() {
        let data = vec![0b10110001];
        let mut reader = BitReader::new(data.as_slice());

        let bits: Vec<bool> = (0..8).map(|_| reader.read_bit().unwrap()).collect();
        assert_eq!(bits, vec![true, false, false, false, true, true, false, true]);
    }

    #[test]
    fn test_align_to_byte() {
        let data = vec![0xFF, 0xAB];
        let mut reader = BitReader::new(data.as_slice());

        reader.read_bits(3).unwrap();
        reader.align_to_byte();
        assert_eq!(reader.read_bits(8).unwrap(), 0xAB);
    }

    #[test]
    fn test_read_u16_le() {
        let data = vec![0x34, 0x12];
        let mut reader = BitReader::new(data.as_slice());
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
    }

    #[test]
    fn test_cross_byte_boundary() {
        let data = vec![0xFF, 0x00];
        let mut reader = BitReader::new(data.as_slice());
        assert_eq!(reader.read_bits(12).unwrap(), 0x0FF);
    }

    #[test]
    fn test_read_past_end_fails() {
        let data = vec![0xFF];
        let mut reader = BitReader::new(data.as_slice());
        assert_eq!(reader.read_bits(6).unwrap(), 0x3F);
        assert!(matches!(reader.read_bits(3), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_peek_past_end_pads_with_zeros() {
        let data = vec![0x05];
        let mut reader = BitReader::new(data.as_slice());
        assert_eq!(reader.peek_bits(15).unwrap(), 0x05);
        reader.consume_bits(3).unwrap();
        assert!(matches!(reader.consume_bits(6), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_peek_reversed() {
        // First stream bits are 1, 1, 0 -> code 0b110 when read MSB-first
        let data = vec![0b0000_0011];
        let mut reader = BitReader::new(data.as_slice());
        assert_eq!(reader.peek_bits_reversed(3).unwrap(), 0b110);
    }

    #[test]
    fn test_read_aligned_mixes_buffer_and_source() {
        let data: Vec<u8> = (0..32).collect();
        let mut reader = BitReader::new(data.as_slice());
        assert_eq!(reader.read_bits(4).unwrap(), 0);
        let mut out = [0u8; 20];
        reader.read_aligned(&mut out).unwrap();
        assert_eq!(out.to_vec(), (1..21).collect::<Vec<u8>>());
        assert_eq!(reader.read_bits(8).unwrap(), 21);
        assert_eq!(reader.consumed_bytes(), 22);
    }
}
