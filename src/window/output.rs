use crate::error::{Error, Result};
use std::io::Write;

/// Circular output buffer for the decoder
///
/// Holds the back-reference history plus decoded bytes the caller has not
/// collected yet. Distances passed to [`copy_block`](Self::copy_block) and
/// [`get_byte`](Self::get_byte) are zero-based: distance 0 is the most recent
/// byte.
pub struct OutputWindow {
    buf: Vec<u8>,
    mask: usize,
    /// Next write position
    pos: usize,
    /// Bytes written but not flushed
    pending: usize,
    /// Total bytes ever written
    total_written: u64,
    /// Back-reference window size
    history: usize,
}

impl OutputWindow {
    /// Create a window for `history` bytes of back-references; `capacity` is
    /// rounded up to a power of two
    pub fn new(history: usize, capacity: usize) -> Self {
        let size = capacity.max(history * 2).next_power_of_two();
        Self { buf: vec![0u8; size], mask: size - 1, pos: 0, pending: 0, total_written: 0, history }
    }

    /// Add a single byte to the window
    #[inline]
    pub fn put_byte(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos = (self.pos + 1) & self.mask;
        self.pending += 1;
        self.total_written += 1;
    }

    /// Add multiple bytes to the window
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.free());
        let mut rest = bytes;
        while !rest.is_empty() {
            let n = rest.len().min(self.buf.len() - self.pos);
            self.buf[self.pos..self.pos + n].copy_from_slice(&rest[..n]);
            self.pos = (self.pos + n) & self.mask;
            rest = &rest[n..];
        }
        self.pending += bytes.len();
        self.total_written += bytes.len() as u64;
    }

    /// Check that a zero-based `distance` points at produced history
    #[inline]
    pub fn check_distance(&self, distance: u32) -> Result<()> {
        let available = self.total_written.min(self.history as u64);
        if distance as u64 >= available {
            return Err(Error::InvalidBackReference { distance: distance + 1, available });
        }
        Ok(())
    }

    /// Copy `length` bytes starting `distance + 1` bytes behind the cursor
    ///
    /// Length can exceed distance (run-length encoding case).
    pub fn copy_block(&mut self, distance: u32, length: usize) -> Result<()> {
        self.check_distance(distance)?;
        debug_assert!(length <= self.free());

        let mut src = self.pos.wrapping_sub(distance as usize + 1) & self.mask;
        let dist = distance as usize + 1;
        if length <= dist && src + length <= self.buf.len() && self.pos + length <= self.buf.len() {
            self.buf.copy_within(src..src + length, self.pos);
            self.pos = (self.pos + length) & self.mask;
        } else {
            for _ in 0..length {
                self.buf[self.pos] = self.buf[src];
                self.pos = (self.pos + 1) & self.mask;
                src = (src + 1) & self.mask;
            }
        }
        self.pending += length;
        self.total_written += length as u64;
        Ok(())
    }

    /// Byte `distance + 1` positions behind the cursor
    #[inline]
    pub fn get_byte(&self, distance: u32) -> u8 {
        self.buf[self.pos.wrapping_sub(distance as usize + 1) & self.mask]
    }

    /// Move up to `out.len()` pending bytes into `out`
    pub fn flush_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.pending);
        let mut start = self.pos.wrapping_sub(self.pending) & self.mask;
        let mut copied = 0;
        while copied < n {
            let chunk = (n - copied).min(self.buf.len() - start);
            out[copied..copied + chunk].copy_from_slice(&self.buf[start..start + chunk]);
            copied += chunk;
            start = (start + chunk) & self.mask;
        }
        self.pending -= n;
        n
    }

    /// Write all pending bytes to `sink`
    pub fn flush_to<W: Write>(&mut self, sink: &mut W) -> std::io::Result<()> {
        while self.pending > 0 {
            let start = self.pos.wrapping_sub(self.pending) & self.mask;
            let chunk = self.pending.min(self.buf.len() - start);
            sink.write_all(&self.buf[start..start + chunk])?;
            self.pending -= chunk;
        }
        Ok(())
    }

    /// Bytes written but not flushed
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Bytes that can be produced without overwriting history or pending output
    pub fn free(&self) -> usize {
        self.buf.len() - self.pending.max(self.history)
    }

    /// Get total bytes written
    pub fn total_written(&self) -> u64 {
        self.total_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_flush() {
        let mut window = OutputWindow::new(8, 16);
        window.put_bytes(b"hello");
        window.put_byte(b'!');
        assert_eq!(window.pending(), 6);

        let mut out = [0u8; 4];
        assert_eq!(window.flush_into(&mut out), 4);
        assert_eq!(&out, b"hell");
        let mut sink = Vec::new();
        window.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"o!");
        assert_eq!(window.total_written(), 6);
    }

    #[test]
    fn test_overlapping_copy() {
        let mut window = OutputWindow::new(8, 16);
        window.put_bytes(b"ab");
        // distance 1 (zero-based) starts at 'a'
        window.copy_block(1, 6).unwrap();
        let mut sink = Vec::new();
        window.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"abababab");
        assert_eq!(window.get_byte(0), b'b');
        assert_eq!(window.get_byte(1), b'a');
    }

    #[test]
    fn test_copy_wraps_around() {
        let mut window = OutputWindow::new(4, 8);
        let mut sink = Vec::new();
        window.put_bytes(b"0123456");
        window.flush_to(&mut sink).unwrap();
        window.copy_block(3, 4).unwrap();
        window.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"01234563456");
    }

    #[test]
    fn test_distance_beyond_output_fails() {
        let mut window = OutputWindow::new(8, 16);
        window.put_bytes(b"abc");
        assert!(window.copy_block(2, 1).is_ok());
        assert!(matches!(
            window.copy_block(4, 1),
            Err(Error::InvalidBackReference { distance: 5, available: 4 })
        ));
    }

    #[test]
    fn test_free_space() {
        let mut window = OutputWindow::new(4, 16);
        assert_eq!(window.free(), 12);
        window.put_bytes(&[0u8; 10]);
        assert_eq!(window.free(), 6);
        let mut sink = Vec::new();
        window.flush_to(&mut sink).unwrap();
        assert_eq!(window.free(), 12);
    }
}
