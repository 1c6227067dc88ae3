use super::optimal::{Optimal, Prices, MATCH_ARRAY_LIMIT, MATCH_ARRAY_SIZE, NUM_OPTS};
use super::tables::{
    distance_slot, encode_distance, encode_length, length_slot, Format, CODE_LENGTH_ORDER,
    DISTANCE_TABLE, DIST_TABLE_SIZE, END_OF_BLOCK, FIXED_LIT_LEN_TABLE_SIZE, MATCH_MIN_LEN,
    MATCH_SYMBOL_BASE, MAX_STORED_BLOCK_SIZE, NUM_CODE_LENGTH_SYMBOLS,
};
use super::tokens::{Match, Token};
use crate::bits::BitWriter;
use crate::config::{BlockTuning, EncoderSettings};
use crate::huffman::encoder::{
    build_code_lengths, count_code_length_symbols, run_length_encode, table_price,
    CODE_LENGTH_EXTRA_BITS, MAX_CL_CODE_LENGTH,
};
use crate::huffman::tables::{fixed_distance_lengths, fixed_literal_lengths};
use crate::huffman::HuffmanEncoder;
use crate::matchfinder::MatchFinder;
use crate::window::InputWindow;

/// Target uncompressed size of a top-level block
pub const BLOCK_SIZE_THRESHOLD: usize = MAX_STORED_BLOCK_SIZE - 258 - NUM_OPTS;

/// Literal/length code count is never trimmed below this
const NUM_LIT_LEN_CODES_MIN: usize = 257;
const NUM_DIST_CODES_MIN: usize = 1;
const NUM_LEVEL_CODES_MIN: usize = 4;

/// Code lengths for both alphabets of one block
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Levels {
    pub lit_len: [u8; FIXED_LIT_LEN_TABLE_SIZE],
    pub dist: [u8; DIST_TABLE_SIZE],
}

impl Levels {
    /// Starting guess used to price the very first block
    pub(super) fn initial() -> Self {
        let mut lit_len = [5u8; FIXED_LIT_LEN_TABLE_SIZE];
        lit_len[..END_OF_BLOCK].fill(8);
        lit_len[END_OF_BLOCK] = 13;
        Self { lit_len, dist: [5; DIST_TABLE_SIZE] }
    }

    fn fixed() -> Self {
        Self { lit_len: fixed_literal_lengths(), dist: fixed_distance_lengths() }
    }
}

/// One node of the block split tree
///
/// Slot 1 is the top-level block; slot `i` splits into `2i` and `2i + 1`.
#[derive(Clone, Debug)]
struct TrialSlot {
    levels: Levels,
    block_size: usize,
    /// Match cache offset where this block's parse starts
    cache_pos: usize,
    use_sub_blocks: bool,
    store_mode: bool,
    static_mode: bool,
}

impl TrialSlot {
    fn new() -> Self {
        Self {
            levels: Levels::initial(),
            block_size: 0,
            cache_pos: 0,
            use_sub_blocks: false,
            store_mode: false,
            static_mode: false,
        }
    }
}

/// Dynamic block header produced by the latest dynamic trial
#[derive(Debug, Default)]
struct DynamicHeader {
    num_lit_len: usize,
    num_dist: usize,
    num_level_codes: usize,
    level_lens: [u8; NUM_CODE_LENGTH_SYMBOLS],
    lit_runs: Vec<(u8, u8)>,
    dist_runs: Vec<(u8, u8)>,
}

/// LZ77 + Huffman block encoder
///
/// Owns the input window (through the match finder) and turns it into
/// DEFLATE blocks. Every top-level block is parsed in trial passes: each pass
/// prices tokens with the code lengths of the previous one, the resulting
/// dynamic block is compared with fixed and stored encodings, and with
/// multiple passes the block is recursively split in halves when the two
/// halves are cheaper. Match lists from the first pass are cached so later
/// passes replay them instead of searching again.
pub struct BlockEncoder {
    pub(super) format: Format,
    pub(super) mf: MatchFinder,
    pub(super) fast_bytes: usize,
    fast_mode: bool,
    num_passes: u32,
    num_div_passes: u32,
    check_static: bool,
    pub(super) multi_pass: bool,
    value_block_size: usize,
    tuning: BlockTuning,
    len_extra: [u8; 29],
    /// Lookahead needed before a top-level block can run without finishing
    trigger: usize,

    pub(super) cache: Vec<u32>,
    pub(super) cache_pos: usize,
    pub(super) second_pass: bool,
    /// Distance from the match finder cursor back to the parse position
    pub(super) additional_offset: usize,
    pub(super) matches: Vec<Match>,

    pub(super) optimum: Vec<Optimal>,
    pub(super) optimum_cur: usize,
    pub(super) optimum_end: usize,
    pub(super) prices: Prices,

    values: Vec<Token>,
    main_freqs: [u32; FIXED_LIT_LEN_TABLE_SIZE],
    dist_freqs: [u32; DIST_TABLE_SIZE],
    new_levels: Levels,
    slots: Vec<TrialSlot>,
    block_size_res: usize,
    header: DynamicHeader,
}

impl BlockEncoder {
    pub fn new(settings: &EncoderSettings) -> Self {
        let format = settings.format;
        let match_max = format.match_max_len();
        let block_span_max = BLOCK_SIZE_THRESHOLD + NUM_OPTS + match_max;
        let trigger = block_span_max + match_max;
        let window = InputWindow::new(format.history_size(), trigger, 1 << 16);
        let mf = MatchFinder::new(
            settings.match_finder,
            format,
            settings.fast_bytes,
            settings.cycles,
            window,
        );

        let multi_pass = settings.num_passes != 1 || settings.num_div_passes != 1;
        let mut len_extra = [0u8; 29];
        for (slot, extra) in len_extra.iter_mut().enumerate() {
            *extra = format.length_extra_bits(slot);
        }
        let tuning = settings.tuning.clone();
        let value_block_size =
            tuning.value_block_base + tuning.value_block_per_div * settings.num_div_passes as usize;

        Self {
            format,
            mf,
            fast_bytes: settings.fast_bytes,
            fast_mode: settings.fast_mode,
            num_passes: settings.num_passes,
            num_div_passes: settings.num_div_passes,
            check_static: multi_pass,
            multi_pass,
            value_block_size,
            tuning,
            len_extra,
            trigger,
            cache: if multi_pass { vec![0; MATCH_ARRAY_SIZE] } else { Vec::new() },
            cache_pos: 0,
            second_pass: false,
            additional_offset: 0,
            matches: Vec::with_capacity(258),
            optimum: vec![Optimal::default(); NUM_OPTS + 258 + 1],
            optimum_cur: 0,
            optimum_end: 0,
            prices: Prices::new(&Levels::initial(), format),
            values: Vec::with_capacity(value_block_size + NUM_OPTS),
            main_freqs: [0; FIXED_LIT_LEN_TABLE_SIZE],
            dist_freqs: [0; DIST_TABLE_SIZE],
            new_levels: Levels::initial(),
            slots: vec![TrialSlot::new(); 1 << settings.num_div_passes],
            block_size_res: 0,
            header: DynamicHeader::default(),
        }
    }

    /// Append input; returns the number of bytes taken
    pub fn fill(&mut self, data: &[u8]) -> usize {
        self.mf.fill(data)
    }

    /// Buffered bytes not yet encoded
    pub fn lookahead(&self) -> usize {
        self.mf.available()
    }

    /// True when enough input is buffered to encode a block mid-stream
    pub fn ready(&self) -> bool {
        self.lookahead() >= self.trigger
    }

    /// Total bytes encoded
    pub fn processed(&self) -> u64 {
        self.mf.window().processed()
    }

    /// Encode one top-level block; returns true when it was the final block
    ///
    /// The block is final when `finishing` is set and it consumed all
    /// buffered input.
    pub fn encode_block(&mut self, writer: &mut BitWriter, finishing: bool) -> bool {
        const ROOT: usize = 1;
        self.slots[ROOT].block_size = BLOCK_SIZE_THRESHOLD;
        self.slots[ROOT].cache_pos = 0;
        self.second_pass = false;
        self.cache_pos = 0;
        self.optimum_cur = 0;
        self.optimum_end = 0;

        self.block_price(ROOT, self.num_div_passes);
        let final_block = finishing && self.mf.available() == 0;
        self.code_block(writer, ROOT, final_block);
        debug_assert_eq!(self.additional_offset, 0);
        final_block
    }

    /// Parse tokens into `values` until the target block size is reached at a
    /// parse chunk boundary, counting symbol frequencies
    fn try_block(&mut self) {
        self.main_freqs.fill(0);
        self.dist_freqs.fill(0);
        self.values.clear();

        let block_size = self.block_size_res;
        self.block_size_res = 0;
        loop {
            if self.optimum_cur == self.optimum_end
                && (self.cache_pos >= MATCH_ARRAY_LIMIT
                    || self.block_size_res >= block_size
                    || (!self.second_pass
                        && (self.mf.available() == 0
                            || self.values.len() >= self.value_block_size)))
            {
                break;
            }

            let (len, dist) =
                if self.fast_mode { self.get_optimal_fast() } else { self.get_optimal() };
            if len >= MATCH_MIN_LEN {
                self.main_freqs[MATCH_SYMBOL_BASE + length_slot(self.format, len as u32)] += 1;
                self.dist_freqs[distance_slot(dist)] += 1;
                self.values.push(Token::Match { length: len as u32, distance: dist });
            } else {
                let byte = self.mf.window().byte_behind(self.additional_offset);
                self.main_freqs[byte as usize] += 1;
                self.values.push(Token::Literal(byte));
            }
            self.additional_offset -= len;
            self.block_size_res += len;
        }
        self.main_freqs[END_OF_BLOCK] += 1;
        self.additional_offset += self.block_size_res;
        self.second_pass = true;
    }

    /// Build code lengths from the last trial's frequencies
    fn make_tables(&mut self, max_bits: u8) {
        let lit_len = build_code_lengths(&self.main_freqs, max_bits);
        let dist = build_code_lengths(&self.dist_freqs, max_bits);
        self.new_levels.lit_len.copy_from_slice(&lit_len);
        self.new_levels.dist.copy_from_slice(&dist);
    }

    /// Bits for the token stream of the last trial under `new_levels`
    fn lz_block_price(&self) -> u32 {
        table_price(&self.main_freqs, &self.new_levels.lit_len, &self.len_extra, MATCH_SYMBOL_BASE)
            + table_price(&self.dist_freqs, &self.new_levels.dist, &DIST_EXTRA_BITS, 0)
    }

    /// Parse the block of `slot` as a dynamic block, refining prices over
    /// `num_passes` passes; returns the encoded size in bits
    fn try_dyn_block(&mut self, slot: usize, num_passes: u32) -> u32 {
        self.block_size_res = self.slots[slot].block_size;
        let start_pos = self.slots[slot].cache_pos;
        if !self.fast_mode {
            self.prices.update(&self.slots[slot].levels, self.format);
        }

        for _ in 0..num_passes {
            self.cache_pos = start_pos;
            self.try_block();
            self.make_tables(self.tuning.huffman_bits(self.values.len()));
            if !self.fast_mode {
                self.prices.update(&self.new_levels, self.format);
            }
        }
        self.slots[slot].levels = self.new_levels.clone();

        let lit_len = &self.new_levels.lit_len;
        let mut num_lit_len = FIXED_LIT_LEN_TABLE_SIZE;
        while num_lit_len > NUM_LIT_LEN_CODES_MIN && lit_len[num_lit_len - 1] == 0 {
            num_lit_len -= 1;
        }
        let dist = &self.new_levels.dist;
        let mut num_dist = DIST_TABLE_SIZE;
        while num_dist > NUM_DIST_CODES_MIN && dist[num_dist - 1] == 0 {
            num_dist -= 1;
        }

        let lit_runs = run_length_encode(&lit_len[..num_lit_len]);
        let dist_runs = run_length_encode(&dist[..num_dist]);
        let mut level_freqs = [0u32; NUM_CODE_LENGTH_SYMBOLS];
        count_code_length_symbols(&lit_runs, &mut level_freqs);
        count_code_length_symbols(&dist_runs, &mut level_freqs);

        let mut level_lens = [0u8; NUM_CODE_LENGTH_SYMBOLS];
        level_lens.copy_from_slice(&build_code_lengths(&level_freqs, MAX_CL_CODE_LENGTH));

        let mut num_level_codes = NUM_LEVEL_CODES_MIN;
        for (i, &sym) in CODE_LENGTH_ORDER.iter().enumerate() {
            if level_lens[sym] != 0 && i >= num_level_codes {
                num_level_codes = i + 1;
            }
        }

        self.header = DynamicHeader {
            num_lit_len,
            num_dist,
            num_level_codes,
            level_lens,
            lit_runs,
            dist_runs,
        };

        self.lz_block_price()
            + table_price(&level_freqs, &level_lens, &CODE_LENGTH_EXTRA_BITS, 0)
            + 5
            + 5
            + 4
            + num_level_codes as u32 * 3
            + 1
            + 2
    }

    /// Parse the block of `slot` against the fixed codes; returns its size in
    /// bits
    fn try_fixed_block(&mut self, slot: usize) -> u32 {
        self.block_size_res = self.slots[slot].block_size;
        self.cache_pos = self.slots[slot].cache_pos;
        self.new_levels = Levels::fixed();
        if !self.fast_mode {
            self.prices.update(&self.new_levels, self.format);
        }
        self.try_block();
        1 + 2 + self.lz_block_price()
    }

    /// Choose the cheapest encoding for the block of `slot`, recursing into
    /// its halves while `num_div_passes` allows; returns the price in bits
    ///
    /// Restores the parse position and cache offset to the end of the block.
    fn block_price(&mut self, slot: usize, num_div_passes: u32) -> u32 {
        self.slots[slot].static_mode = false;
        let mut price = self.try_dyn_block(slot, self.num_passes);
        self.slots[slot].block_size = self.block_size_res;
        let num_values = self.values.len();
        let end_cache_pos = self.cache_pos;
        let end_offset = self.additional_offset;

        if self.check_static && num_values <= self.tuning.fixed_block_max_values {
            let fixed_price = self.try_fixed_block(slot);
            self.slots[slot].static_mode = fixed_price < price;
            if self.slots[slot].static_mode {
                price = fixed_price;
            }
        }

        let store_price = stored_price(self.block_size_res);
        self.slots[slot].store_mode = store_price <= price;
        if self.slots[slot].store_mode {
            price = store_price;
        }

        self.slots[slot].use_sub_blocks = false;
        if num_div_passes > 1 && num_values >= self.tuning.divide_min_values {
            let (left, right) = (slot * 2, slot * 2 + 1);
            let block_size = self.slots[slot].block_size;
            self.slots[left].levels = self.slots[slot].levels.clone();
            self.slots[left].block_size = block_size >> 1;
            self.slots[left].cache_pos = self.slots[slot].cache_pos;
            let mut sub_price = self.block_price(left, num_div_passes - 1);

            let left_size = self.slots[left].block_size;
            let right_size = block_size.saturating_sub(left_size);
            if left_size >= self.tuning.divide_min_block
                && right_size >= self.tuning.divide_min_block
            {
                self.slots[right].levels = self.slots[slot].levels.clone();
                self.slots[right].block_size = right_size;
                self.slots[right].cache_pos = self.cache_pos;
                self.additional_offset -= left_size;
                sub_price += self.block_price(right, num_div_passes - 1);
                self.slots[slot].use_sub_blocks = sub_price < price;
                if self.slots[slot].use_sub_blocks {
                    price = sub_price;
                }
            }
        }

        self.additional_offset = end_offset;
        self.cache_pos = end_cache_pos;
        price
    }

    /// Write the block of `slot` with the encoding chosen by `block_price`
    fn code_block(&mut self, writer: &mut BitWriter, slot: usize, final_block: bool) {
        if self.slots[slot].use_sub_blocks {
            self.code_block(writer, slot * 2, false);
            self.code_block(writer, slot * 2 + 1, final_block);
            return;
        }

        let block_size = self.slots[slot].block_size;
        if self.slots[slot].store_mode {
            let data = self.mf.window().slice_behind(self.additional_offset, block_size);
            write_stored(writer, data, final_block);
        } else {
            writer.write_bit(final_block);
            let (lit_len, dist) = if self.slots[slot].static_mode {
                writer.write_bits(1, 2);
                self.try_fixed_block(slot);
                (
                    HuffmanEncoder::from_lengths(&self.new_levels.lit_len),
                    HuffmanEncoder::from_lengths(&self.new_levels.dist),
                )
            } else {
                if self.multi_pass {
                    self.try_dyn_block(slot, 1);
                }
                writer.write_bits(2, 2);
                self.write_dynamic_header(writer);
                let levels = &self.new_levels;
                (
                    HuffmanEncoder::from_lengths(&levels.lit_len[..self.header.num_lit_len]),
                    HuffmanEncoder::from_lengths(&levels.dist[..self.header.num_dist]),
                )
            };
            self.write_tokens(writer, &lit_len, &dist);
        }
        self.additional_offset -= block_size;
    }

    fn write_dynamic_header(&self, writer: &mut BitWriter) {
        let header = &self.header;
        writer.write_bits((header.num_lit_len - NUM_LIT_LEN_CODES_MIN) as u32, 5);
        writer.write_bits((header.num_dist - NUM_DIST_CODES_MIN) as u32, 5);
        writer.write_bits((header.num_level_codes - NUM_LEVEL_CODES_MIN) as u32, 4);
        for &sym in &CODE_LENGTH_ORDER[..header.num_level_codes] {
            writer.write_bits(header.level_lens[sym] as u32, 3);
        }
        let levels = HuffmanEncoder::from_lengths(&header.level_lens);
        levels.write_runs(writer, &header.lit_runs);
        levels.write_runs(writer, &header.dist_runs);
    }

    fn write_tokens(
        &self,
        writer: &mut BitWriter,
        lit_len: &HuffmanEncoder,
        dist: &HuffmanEncoder,
    ) {
        for token in &self.values {
            match *token {
                Token::Literal(byte) => lit_len.write(writer, byte as usize),
                Token::Match { length, distance } => {
                    let (code, extra, bits) = encode_length(self.format, length);
                    lit_len.write(writer, code as usize);
                    writer.write_bits(extra, bits);

                    let (code, extra, bits) = encode_distance(distance);
                    dist.write(writer, code as usize);
                    writer.write_bits(extra, bits);
                }
            }
        }
        lit_len.write(writer, END_OF_BLOCK);
    }
}

const DIST_EXTRA_BITS: [u8; DIST_TABLE_SIZE] = {
    let mut bits = [0u8; DIST_TABLE_SIZE];
    let mut i = 0;
    while i < DIST_TABLE_SIZE {
        bits[i] = DISTANCE_TABLE[i].1;
        i += 1;
    }
    bits
};

/// Bits needed to store `block_size` bytes as stored blocks starting on a
/// byte boundary
pub fn stored_price(block_size: usize) -> u32 {
    let mut remaining = block_size;
    let mut price = 0u32;
    loop {
        let cur = remaining.min(MAX_STORED_BLOCK_SIZE);
        // header bits plus padding to the byte boundary
        price += 3 + 5 + 32 + 8 * cur as u32;
        remaining -= cur;
        if remaining == 0 {
            return price;
        }
    }
}

/// Write `data` as stored blocks of at most 65535 bytes; only the last one
/// carries the final flag. Empty data still writes one empty block.
pub fn write_stored(writer: &mut BitWriter, data: &[u8], final_block: bool) {
    let mut rest = data;
    loop {
        let cur = rest.len().min(MAX_STORED_BLOCK_SIZE);
        writer.write_bit(final_block && cur == rest.len());
        writer.write_bits(0, 2);
        writer.align_to_byte();
        writer.write_u16_le(cur as u16);
        writer.write_u16_le(!(cur as u16));
        writer.write_bytes(&rest[..cur]);
        rest = &rest[cur..];
        if rest.is_empty() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressionLevel, EncoderConfig};

    fn encode_all(level: u8, deflate64: bool, data: &[u8]) -> Vec<u8> {
        let config = EncoderConfig {
            deflate64,
            ..EncoderConfig::new(CompressionLevel::from_level(level))
        };
        let mut encoder = BlockEncoder::new(&config.resolve().unwrap());
        let mut writer = BitWriter::new();
        let mut rest = data;
        loop {
            let n = encoder.fill(rest);
            rest = &rest[n..];
            while encoder.ready() {
                encoder.encode_block(&mut writer, false);
            }
            if rest.is_empty() {
                break;
            }
        }
        while !encoder.encode_block(&mut writer, true) {}
        writer.finish()
    }

    fn inflate(data: &[u8]) -> Vec<u8> {
        use std::io::Read;
        let mut out = Vec::new();
        flate2::read::DeflateDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_initial_levels() {
        let levels = Levels::initial();
        assert_eq!(levels.lit_len[0], 8);
        assert_eq!(levels.lit_len[255], 8);
        assert_eq!(levels.lit_len[256], 13);
        assert_eq!(levels.lit_len[257], 5);
        assert_eq!(levels.dist[31], 5);
    }

    #[test]
    fn test_stored_price() {
        assert_eq!(stored_price(0), 40);
        assert_eq!(stored_price(10), 120);
        let size = MAX_STORED_BLOCK_SIZE + 1;
        assert_eq!(stored_price(size), 40 * 2 + 8 * size as u32);
    }

    #[test]
    fn test_write_stored_splits() {
        let data = vec![7u8; MAX_STORED_BLOCK_SIZE + 10];
        let mut writer = BitWriter::new();
        write_stored(&mut writer, &data, true);
        let out = writer.finish();
        assert_eq!(out.len(), data.len() + 10);
        assert_eq!(out[0], 0x00);
        assert_eq!(&out[1..5], &[0xFF, 0xFF, 0x00, 0x00]);
        let second = 5 + MAX_STORED_BLOCK_SIZE;
        assert_eq!(out[second], 0x01);
        assert_eq!(&out[second + 1..second + 5], &[10, 0, 0xF5, 0xFF]);
        assert_eq!(inflate(&out), data);
    }

    #[test]
    fn test_empty_input_single_block() {
        for level in [1, 5] {
            assert_eq!(encode_all(level, false, &[]), vec![0x01, 0x00, 0x00, 0xFF, 0xFF]);
        }
        // multi-pass levels also try the fixed codes: final bit, type 01, EOB
        assert_eq!(encode_all(9, false, &[]), vec![0x03, 0x00]);
    }

    #[test]
    fn test_repetitive_data_compresses() {
        let data: Vec<u8> = b"ABABABABABABABABABABABAB".repeat(4000);
        for level in [1, 5, 7, 9] {
            let out = encode_all(level, false, &data);
            assert!(out.len() < data.len() / 50, "level {level}: {} bytes", out.len());
            assert_eq!(inflate(&out), data, "level {level}");
        }
    }

    #[test]
    fn test_mixed_data_roundtrip_across_blocks() {
        let mut data = Vec::new();
        let mut state = 0x1234_5678u32;
        for i in 0..300_000u32 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let byte = if i % 7 < 3 { (state >> 24) as u8 } else { b"deflate"[(i % 7) as usize] };
            data.push(byte);
        }
        for level in [1, 6, 8] {
            let out = encode_all(level, false, &data);
            assert_eq!(inflate(&out), data, "level {level}");
        }
    }

    #[test]
    fn test_random_data_falls_back_to_stored() {
        let mut state = 99u32;
        let data: Vec<u8> = (0..20_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let out = encode_all(9, false, &data);
        assert!(out.len() <= data.len() + 5 * (data.len() / MAX_STORED_BLOCK_SIZE + 1));
        assert_eq!(inflate(&out), data);
    }
}
