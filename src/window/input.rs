/// Linear read-ahead buffer for the encoder
///
/// Bytes from `cursor - keep_before` up to the end of the buffered data are
/// addressable. When the buffer is full, the retained tail is moved to the
/// front in one copy; positions relative to the cursor are unaffected.
pub struct InputWindow {
    buf: Vec<u8>,
    /// Cursor: index of the next byte the match finder looks at
    pos: usize,
    /// End of buffered data
    end: usize,
    /// Bytes kept behind the cursor when moving the block
    keep_before: usize,
    /// Bytes the cursor has moved past
    processed: u64,
}

impl InputWindow {
    /// Create a window retaining `keep_before` bytes of history with room for
    /// `keep_after` bytes of lookahead plus `chunk` bytes of fresh input
    pub fn new(keep_before: usize, keep_after: usize, chunk: usize) -> Self {
        Self {
            buf: vec![0u8; keep_before + keep_after + chunk],
            pos: 0,
            end: 0,
            keep_before,
            processed: 0,
        }
    }

    /// Append as much of `data` as fits; returns the number of bytes taken
    pub fn fill(&mut self, data: &[u8]) -> usize {
        if self.end == self.buf.len() {
            self.move_block();
        }
        let n = data.len().min(self.buf.len() - self.end);
        self.buf[self.end..self.end + n].copy_from_slice(&data[..n]);
        self.end += n;
        n
    }

    /// Move the retained history and lookahead to the front of the buffer
    fn move_block(&mut self) {
        if self.pos <= self.keep_before {
            return;
        }
        let shift = self.pos - self.keep_before;
        self.buf.copy_within(shift..self.end, 0);
        self.pos -= shift;
        self.end -= shift;
    }

    /// Bytes buffered at or after the cursor
    #[inline]
    pub fn lookahead(&self) -> usize {
        self.end - self.pos
    }

    /// Byte `back` positions behind the cursor
    #[inline]
    pub fn byte_behind(&self, back: usize) -> u8 {
        self.buf[self.pos - back]
    }

    /// `len` bytes starting `back` positions behind the cursor
    #[inline]
    pub fn slice_behind(&self, back: usize, len: usize) -> &[u8] {
        &self.buf[self.pos - back..self.pos - back + len]
    }

    /// Buffered bytes from the cursor onwards
    #[inline]
    pub fn ahead(&self) -> &[u8] {
        &self.buf[self.pos..self.end]
    }

    /// The whole buffer and the cursor index into it
    #[inline]
    pub fn buffer(&self) -> (&[u8], usize) {
        (&self.buf[..self.end], self.pos)
    }

    /// Move the cursor forward without looking at the bytes
    #[inline]
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.lookahead());
        self.pos += n;
        self.processed += n as u64;
    }

    /// Total bytes the cursor has moved past
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_advance() {
        let mut window = InputWindow::new(4, 4, 4);
        assert_eq!(window.fill(b"abcdef"), 6);
        assert_eq!(window.lookahead(), 6);
        window.advance(2);
        assert_eq!(window.ahead()[0], b'c');
        assert_eq!(window.byte_behind(1), b'b');
        assert_eq!(window.ahead(), b"cdef");
        assert_eq!(window.processed(), 2);
    }

    #[test]
    fn test_move_block_keeps_history() {
        let mut window = InputWindow::new(3, 2, 3);
        assert_eq!(window.fill(b"0123456789"), 8);
        window.advance(7);
        // Full buffer: the next fill moves "4567" to the front
        assert_eq!(window.fill(b"89ab"), 4);
        assert_eq!(window.ahead(), b"789ab");
        assert_eq!(window.slice_behind(3, 3), b"456");
        assert_eq!(window.processed(), 7);
    }

    #[test]
    fn test_fill_refuses_when_no_room() {
        let mut window = InputWindow::new(2, 2, 2);
        assert_eq!(window.fill(b"abcdef"), 6);
        window.advance(1);
        // Cursor is still inside the kept history, nothing can be dropped
        assert_eq!(window.fill(b"g"), 0);
    }
}
