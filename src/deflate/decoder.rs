use super::tables::{
    decode_distance, decode_length, Format, CODE_LENGTH_ORDER, DISTANCE_TABLE, END_OF_BLOCK,
    MATCH_SYMBOL_BASE, NUM_CODE_LENGTH_SYMBOLS, NUM_LIT_LEN_SYMBOLS,
};
use crate::bits::BitReader;
use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use crate::huffman::HuffmanDecoder;
use crate::window::OutputWindow;
use crate::Progress;
use std::io::{self, Read};

/// Decoded bytes buffered between the bitstream and the caller
const WINDOW_CAPACITY: usize = 1 << 18;
/// Stored block bytes copied per read from the source
const STORED_CHUNK: usize = 1 << 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Next bits are a block header
    Header,
    /// Inside a stored block with `remaining` raw bytes left
    Stored { remaining: usize },
    /// Inside a fixed or dynamic Huffman block
    Huffman,
    /// Final block done
    Finished,
}

/// Resumable DEFLATE / Deflate64 block decoder
///
/// Decodes into an [`OutputWindow`] in rounds bounded by the caller. A match
/// cut short by the bound is finished at the start of the next round.
pub struct Inflater<R: Read> {
    bits: BitReader<R>,
    window: OutputWindow,
    format: Format,
    state: State,
    final_block: bool,
    lit_len: HuffmanDecoder,
    dist: HuffmanDecoder,
    /// Distance codes transmitted for the current block
    num_dist_codes: usize,
    copy_remaining: usize,
    /// Zero-based distance of the unfinished copy
    copy_distance: u32,
}

impl<R: Read> Inflater<R> {
    pub fn new(source: R, format: Format) -> Self {
        Self {
            bits: BitReader::new(source),
            window: OutputWindow::new(format.history_size(), WINDOW_CAPACITY),
            format,
            state: State::Header,
            final_block: false,
            lit_len: HuffmanDecoder::fixed_literal_length(),
            dist: HuffmanDecoder::fixed_distance(),
            num_dist_codes: format.num_dist_codes(),
            copy_remaining: 0,
            copy_distance: 0,
        }
    }

    /// Decode up to `limit` bytes into the window; returns the number
    /// produced
    ///
    /// Fewer than `limit` bytes are produced only when the final block ends.
    pub fn decode(&mut self, limit: usize) -> Result<usize> {
        let limit = limit.min(self.window.free());
        let mut produced = 0;

        while self.copy_remaining > 0 && produced < limit {
            let byte = self.window.get_byte(self.copy_distance);
            self.window.put_byte(byte);
            self.copy_remaining -= 1;
            produced += 1;
        }

        while produced < limit {
            match self.state {
                State::Finished => break,
                State::Header => self.read_block_header()?,
                State::Stored { remaining: 0 } => self.end_block(),
                State::Stored { remaining } => {
                    let n = remaining.min(limit - produced).min(STORED_CHUNK);
                    let mut chunk = [0u8; STORED_CHUNK];
                    self.bits.read_aligned(&mut chunk[..n])?;
                    self.window.put_bytes(&chunk[..n]);
                    produced += n;
                    self.state = State::Stored { remaining: remaining - n };
                }
                State::Huffman => produced += self.decode_huffman(limit - produced)?,
            }
        }
        Ok(produced)
    }

    fn end_block(&mut self) {
        self.state = if self.final_block { State::Finished } else { State::Header };
    }

    fn read_block_header(&mut self) -> Result<()> {
        self.final_block = self.bits.read_bit()?;
        match self.bits.read_bits(2)? {
            0 => {
                self.bits.align_to_byte();
                let len = self.bits.read_u16_le()?;
                let nlen = self.bits.read_u16_le()?;
                if len != !nlen {
                    return Err(Error::StoredBlockLengthMismatch { len, nlen });
                }
                self.state = State::Stored { remaining: len as usize };
            }
            1 => {
                self.lit_len = HuffmanDecoder::fixed_literal_length();
                self.dist = HuffmanDecoder::fixed_distance();
                self.num_dist_codes = self.format.num_dist_codes();
                self.state = State::Huffman;
            }
            2 => {
                self.read_dynamic_tables()?;
                self.state = State::Huffman;
            }
            block_type => return Err(Error::InvalidBlockType(block_type as u8)),
        }
        Ok(())
    }

    fn read_dynamic_tables(&mut self) -> Result<()> {
        let hlit = self.bits.read_bits(5)? as usize + 257;
        let hdist = self.bits.read_bits(5)? as usize + 1;
        let hclen = self.bits.read_bits(4)? as usize + 4;
        if hlit > NUM_LIT_LEN_SYMBOLS {
            return Err(Error::InvalidLengthCode((hlit - 1) as u16));
        }
        if hdist > self.format.num_dist_codes() {
            return Err(Error::TooManyDistanceCodes(hdist));
        }

        let mut level_lens = [0u8; NUM_CODE_LENGTH_SYMBOLS];
        for &sym in &CODE_LENGTH_ORDER[..hclen] {
            level_lens[sym] = self.bits.read_bits(3)? as u8;
        }
        let levels = HuffmanDecoder::from_code_lengths(&level_lens)?;

        let total = hlit + hdist;
        let mut lengths = [0u8; NUM_LIT_LEN_SYMBOLS + 32];
        let mut i = 0;
        while i < total {
            let sym = levels.decode(&mut self.bits)?;
            let (value, repeat) = match sym {
                0..=15 => (sym as u8, 1),
                16 => {
                    let prev = match i {
                        0 => return Err(Error::RepeatWithoutPrevious),
                        _ => lengths[i - 1],
                    };
                    (prev, self.bits.read_bits(2)? as usize + 3)
                }
                17 => (0, self.bits.read_bits(3)? as usize + 3),
                18 => (0, self.bits.read_bits(7)? as usize + 11),
                _ => return Err(Error::InvalidCodeLengthSymbol(sym)),
            };
            if i + repeat > total {
                return Err(Error::CodeLengthOverflow { end: i + repeat, available: total });
            }
            lengths[i..i + repeat].fill(value);
            i += repeat;
        }

        self.lit_len = HuffmanDecoder::from_code_lengths(&lengths[..hlit])?;
        self.dist = HuffmanDecoder::from_code_lengths(&lengths[hlit..total])?;
        self.num_dist_codes = hdist;
        Ok(())
    }

    fn decode_huffman(&mut self, limit: usize) -> Result<usize> {
        let mut produced = 0;
        while produced < limit {
            let sym = self.lit_len.decode(&mut self.bits)? as usize;
            if sym < END_OF_BLOCK {
                self.window.put_byte(sym as u8);
                produced += 1;
                continue;
            }
            if sym == END_OF_BLOCK {
                self.end_block();
                break;
            }
            if sym >= NUM_LIT_LEN_SYMBOLS {
                return Err(Error::InvalidLengthCode(sym as u16));
            }

            let slot = sym - MATCH_SYMBOL_BASE;
            let extra = self.bits.read_bits(self.format.length_extra_bits(slot))?;
            let length = decode_length(self.format, sym as u16, extra)
                .ok_or(Error::InvalidLengthCode(sym as u16))?;

            let dist_sym = self.dist.decode(&mut self.bits)?;
            if dist_sym as usize >= self.num_dist_codes {
                return Err(Error::InvalidDistanceCode(dist_sym));
            }
            let extra = self.bits.read_bits(DISTANCE_TABLE[dist_sym as usize].1)?;
            let distance = decode_distance(self.format, dist_sym, extra)
                .ok_or(Error::InvalidDistanceCode(dist_sym))?
                - 1;

            let length = length as usize;
            let n = length.min(limit - produced);
            self.window.copy_block(distance, n)?;
            produced += n;
            if n < length {
                self.copy_remaining = length - n;
                self.copy_distance = distance;
            }
        }
        Ok(produced)
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished && self.copy_remaining == 0
    }

    pub fn window_mut(&mut self) -> &mut OutputWindow {
        &mut self.window
    }

    /// Compressed bytes consumed
    pub fn total_in(&self) -> u64 {
        self.bits.consumed_bytes()
    }

    /// Bytes decoded into the window
    pub fn total_out(&self) -> u64 {
        self.window.total_written()
    }

    pub fn into_inner(self) -> R {
        self.bits.into_inner()
    }
}

/// Streaming DEFLATE / Deflate64 decompressor
///
/// `read` returns 0 once the final block is decoded, or once
/// `expected_size` bytes were produced when a size is configured.
pub struct Decoder<R: Read> {
    inflater: Option<Inflater<R>>,
    expected_size: Option<u64>,
    leave_open: bool,
    progress: Option<Box<dyn Progress + Send>>,
}

impl<R: Read> Decoder<R> {
    pub fn new(source: R, config: &DecoderConfig) -> Self {
        Self {
            inflater: Some(Inflater::new(source, config.format())),
            expected_size: config.expected_size,
            leave_open: config.leave_open,
            progress: None,
        }
    }

    /// Report `(bytes in, bytes out)` after every decoding round
    pub fn with_progress<P: Progress + Send + 'static>(mut self, progress: P) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Decompress into `buf`; returns 0 at the end of the stream
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let inflater = self.inflater.as_mut().ok_or(Error::Disposed)?;
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let window = inflater.window_mut();
            if window.pending() > 0 {
                return Ok(window.flush_into(buf));
            }

            let produced = inflater.total_out();
            let remaining = match self.expected_size {
                Some(expected) => expected - produced,
                None => u64::MAX,
            };
            if remaining == 0 {
                return Ok(0);
            }
            if inflater.is_finished() {
                return match self.expected_size {
                    Some(expected) => Err(Error::SizeMismatch { expected, found: produced }),
                    None => Ok(0),
                };
            }

            inflater.decode(remaining.min(usize::MAX as u64) as usize)?;
            if let Some(progress) = self.progress.as_mut() {
                let _ = progress.report(inflater.total_in(), inflater.total_out());
            }
        }
    }

    /// True once every byte of the stream has been returned
    pub fn is_finished(&self) -> bool {
        match &self.inflater {
            None => true,
            Some(inflater) => {
                let done = match self.expected_size {
                    Some(expected) => inflater.total_out() == expected,
                    None => inflater.is_finished(),
                };
                done && inflater.window.pending() == 0
            }
        }
    }

    /// Compressed bytes consumed so far
    pub fn total_in(&self) -> u64 {
        self.inflater.as_ref().map_or(0, Inflater::total_in)
    }

    /// Release the decoder; the source is returned when the decoder was
    /// configured with `leave_open`, otherwise dropped
    ///
    /// Later reads fail with [`Error::Disposed`].
    pub fn close(&mut self) -> Option<R> {
        let inflater = self.inflater.take()?;
        self.leave_open.then(|| inflater.into_inner())
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_data(buf)?)
    }
}
