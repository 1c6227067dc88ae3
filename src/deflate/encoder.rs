use super::block::{write_stored, BlockEncoder};
use super::tables::MAX_STORED_BLOCK_SIZE;
use crate::bits::BitWriter;
use crate::config::EncoderConfig;
use crate::error::{Error, Result};
use crate::window::InputWindow;
use crate::Progress;
use std::io::{self, Write};

/// How much of the buffered input a block cycle may consume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Only while enough lookahead is buffered for full-size blocks
    Run,
    /// Everything buffered, as non-final blocks
    Flush,
    /// Everything buffered, ending with the final block
    Finish,
}

enum Engine {
    /// Level 0: input is copied into stored blocks
    Store(InputWindow),
    Lz(Box<BlockEncoder>),
}

impl Engine {
    fn fill(&mut self, data: &[u8]) -> usize {
        match self {
            Engine::Store(window) => window.fill(data),
            Engine::Lz(encoder) => encoder.fill(data),
        }
    }

    fn processed(&self) -> u64 {
        match self {
            Engine::Store(window) => window.processed(),
            Engine::Lz(encoder) => encoder.processed(),
        }
    }

    /// Encode one block if `mode` allows it; returns `None` when there was
    /// nothing to do, otherwise whether the block was the final one
    fn step(&mut self, writer: &mut BitWriter, mode: Mode) -> Option<bool> {
        match self {
            Engine::Store(window) => {
                let avail = window.lookahead();
                match mode {
                    Mode::Run if avail < MAX_STORED_BLOCK_SIZE => return None,
                    Mode::Flush if avail == 0 => return None,
                    _ => {}
                }
                let n = avail.min(MAX_STORED_BLOCK_SIZE);
                let last = mode == Mode::Finish && n == avail;
                write_stored(writer, &window.ahead()[..n], last);
                window.advance(n);
                Some(last)
            }
            Engine::Lz(encoder) => {
                match mode {
                    Mode::Run if !encoder.ready() => return None,
                    Mode::Flush if encoder.lookahead() == 0 => return None,
                    _ => {}
                }
                Some(encoder.encode_block(writer, mode == Mode::Finish))
            }
        }
    }
}

/// Streaming DEFLATE / Deflate64 compressor
///
/// Bytes written are buffered and encoded in blocks as soon as enough
/// lookahead is available. Call [`finish`](Self::finish) (or
/// [`close`](Self::close)) to write the final block; dropping an unfinished
/// encoder finishes it and discards any error.
///
/// # Example
///
/// ```
/// use flate64::{CompressionLevel, Encoder, EncoderConfig};
/// use std::io::Write;
///
/// let mut encoder = Encoder::new(Vec::new(), &EncoderConfig::new(CompressionLevel::Level7))?;
/// encoder.write_all(b"ABABABABAB")?;
/// let compressed = encoder.finish()?;
/// assert_eq!(flate64::decompress(&compressed)?, b"ABABABABAB");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Encoder<W: Write> {
    sink: Option<W>,
    engine: Engine,
    writer: BitWriter,
    progress: Option<Box<dyn Progress + Send>>,
    leave_open: bool,
    finished: bool,
    total_in: u64,
}

impl<W: Write> Encoder<W> {
    /// Create an encoder writing to `sink`; fails on invalid options
    pub fn new(sink: W, config: &EncoderConfig) -> Result<Self> {
        let settings = config.resolve()?;
        let engine = if settings.stored_only {
            Engine::Store(InputWindow::new(0, MAX_STORED_BLOCK_SIZE, 1 << 16))
        } else {
            Engine::Lz(Box::new(BlockEncoder::new(&settings)))
        };
        Ok(Self {
            sink: Some(sink),
            engine,
            writer: BitWriter::with_capacity(1 << 17),
            progress: None,
            leave_open: false,
            finished: false,
            total_in: 0,
        })
    }

    /// Report `(bytes in, bytes out)` after every block
    pub fn with_progress<P: Progress + Send + 'static>(mut self, progress: P) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Hand the sink back from [`close`](Self::close) instead of dropping it
    pub fn leave_open(mut self, leave_open: bool) -> Self {
        self.leave_open = leave_open;
        self
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    /// Uncompressed bytes accepted so far
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Compressed bytes produced so far, including a partial last byte
    pub fn total_out(&self) -> u64 {
        self.writer.bit_position().div_ceil(8)
    }

    /// Compress `data`, encoding every block that has enough lookahead
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        if self.sink.is_none() || self.finished {
            return Err(Error::Disposed);
        }
        let mut rest = data;
        while !rest.is_empty() {
            let n = self.engine.fill(rest);
            rest = &rest[n..];
            self.total_in += n as u64;
            self.run(Mode::Run)?;
        }
        Ok(())
    }

    /// Encode everything buffered, then write an empty stored block so the
    /// output ends on a byte boundary, and flush the sink
    pub fn sync_flush(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::Disposed);
        }
        self.run(Mode::Flush)?;
        write_stored(&mut self.writer, &[], false);
        let sink = self.sink.as_mut().ok_or(Error::Disposed)?;
        self.writer.drain_to(sink)?;
        sink.flush()?;
        Ok(())
    }

    /// Write the final block and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.finish_stream()?;
        self.sink.take().ok_or(Error::Disposed)
    }

    /// Write the final block; the sink is returned when the encoder was
    /// opened with [`leave_open`](Self::leave_open), otherwise dropped
    ///
    /// Later writes fail with [`Error::Disposed`].
    pub fn close(&mut self) -> Result<Option<W>> {
        if self.sink.is_none() {
            return Ok(None);
        }
        self.finish_stream()?;
        let sink = self.sink.take();
        Ok(if self.leave_open { sink } else { None })
    }

    fn finish_stream(&mut self) -> Result<()> {
        if !self.finished {
            self.run(Mode::Finish)?;
            self.writer.align_to_byte();
        }
        let sink = self.sink.as_mut().ok_or(Error::Disposed)?;
        self.writer.drain_to(sink)?;
        sink.flush()?;
        Ok(())
    }

    fn run(&mut self, mode: Mode) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(Error::Disposed)?;
        while let Some(last) = self.engine.step(&mut self.writer, mode) {
            self.writer.drain_to(sink)?;
            if let Some(progress) = self.progress.as_mut() {
                let _ = progress.report(self.engine.processed(), self.writer.bit_position() / 8);
            }
            if last {
                self.finished = true;
                break;
            }
        }
        Ok(())
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync_flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for Encoder<W> {
    fn drop(&mut self) {
        if self.sink.is_some() && !self.finished {
            let _ = self.finish_stream();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionLevel;
    use std::io::Read;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    fn config(level: u8) -> EncoderConfig {
        EncoderConfig::new(CompressionLevel::from_level(level))
    }

    fn inflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        flate2::read::DeflateDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_level0_writes_stored_blocks() {
        let data = vec![0x5Au8; 150_000];
        let mut encoder = Encoder::new(Vec::new(), &config(0)).unwrap();
        encoder.write_all(&data).unwrap();
        let out = encoder.finish().unwrap();
        // three stored blocks of 65535, 65535 and 18930 bytes
        assert_eq!(out.len(), data.len() + 3 * 5);
        assert_eq!(out[0], 0x00);
        assert_eq!(inflate(&out), data);
    }

    #[test]
    fn test_small_writes_match_one_write() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i * i / 7) as u8).collect();
        let mut whole = Encoder::new(Vec::new(), &config(6)).unwrap();
        whole.write_all(&data).unwrap();
        let whole = whole.finish().unwrap();

        let mut pieces = Encoder::new(Vec::new(), &config(6)).unwrap();
        for chunk in data.chunks(777) {
            pieces.write_all(chunk).unwrap();
        }
        assert_eq!(pieces.total_in(), data.len() as u64);
        let pieces = pieces.finish().unwrap();
        assert_eq!(whole, pieces);
        assert_eq!(inflate(&pieces), data);
    }

    #[test]
    fn test_flush_emits_sync_marker() {
        let mut encoder = Encoder::new(Vec::new(), &config(5)).unwrap();
        encoder.write_all(b"hello hello hello").unwrap();
        encoder.flush().unwrap();
        let flushed = encoder.get_ref().unwrap().clone();
        assert!(flushed.ends_with(&[0x00, 0x00, 0xFF, 0xFF]));

        // the flushed prefix already decodes to everything written
        let mut out = Vec::new();
        let mut decoder = flate2::read::DeflateDecoder::new(&flushed[..]);
        let mut buf = [0u8; 64];
        while let Ok(n) = decoder.read(&mut buf) {
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"hello hello hello");

        encoder.write_all(b" world").unwrap();
        let out = encoder.finish().unwrap();
        assert_eq!(inflate(&out), b"hello hello hello world");
    }

    #[test]
    fn test_write_after_close_is_disposed() {
        let mut encoder = Encoder::new(Vec::new(), &config(3)).unwrap();
        encoder.write_all(b"abc").unwrap();
        assert!(encoder.close().unwrap().is_none());
        assert!(matches!(encoder.write_data(b"more"), Err(Error::Disposed)));
        assert!(encoder.write(b"more").is_err());
        assert!(encoder.close().unwrap().is_none());
    }

    #[test]
    fn test_leave_open_returns_sink() {
        let mut encoder = Encoder::new(Vec::new(), &config(3)).unwrap().leave_open(true);
        encoder.write_all(b"abcabcabc").unwrap();
        let sink = encoder.close().unwrap().unwrap();
        assert_eq!(inflate(&sink), b"abcabcabc");
    }

    #[test]
    fn test_drop_finishes_stream() {
        let mut out = Vec::new();
        {
            let mut encoder = Encoder::new(&mut out, &config(7)).unwrap();
            encoder.write_all(b"dropped but complete").unwrap();
        }
        assert_eq!(inflate(&out), b"dropped but complete");
    }

    #[test]
    fn test_progress_reports_totals() {
        let seen_in = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&seen_in);
        let data = vec![b'x'; 300_000];
        let mut encoder = Encoder::new(Vec::new(), &config(1))
            .unwrap()
            .with_progress(move |input: u64, _output: u64| -> io::Result<()> {
                seen.store(input, Ordering::Relaxed);
                Ok(())
            });
        encoder.write_all(&data).unwrap();
        encoder.finish().unwrap();
        assert_eq!(seen_in.load(Ordering::Relaxed), data.len() as u64);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EncoderConfig { num_fast_bytes: Some(2), ..EncoderConfig::default() };
        assert!(matches!(Encoder::new(Vec::new(), &config), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_failing_progress_observer_is_ignored() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&reports);
        let data: Vec<u8> = (0..400_000u32).map(|i| (i % 97) as u8 ^ (i / 1021) as u8).collect();
        let mut encoder = Encoder::new(Vec::new(), &config(5))
            .unwrap()
            .with_progress(move |input: u64, output: u64| -> io::Result<()> {
                seen.lock().unwrap().push((input, output));
                Err(io::Error::new(io::ErrorKind::Other, "observer failed"))
            });
        encoder.write_all(&data).unwrap();
        let out = encoder.finish().unwrap();
        assert_eq!(inflate(&out), data);

        let reports = reports.lock().unwrap();
        assert!(reports.len() >= 2, "{} reports", reports.len());
        assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].1));
        assert_eq!(reports.last().unwrap().0, data.len() as u64);
    }
}
