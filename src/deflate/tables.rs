/// Stream variant: plain DEFLATE or the 64 KiB window Deflate64 extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Deflate,
    Deflate64,
}

impl Format {
    /// Back-reference window in bytes
    pub fn history_size(self) -> usize {
        match self {
            Format::Deflate => 1 << 15,
            Format::Deflate64 => 1 << 16,
        }
    }

    /// Longest match a single length code can carry
    pub fn match_max_len(self) -> usize {
        match self {
            Format::Deflate => 258,
            Format::Deflate64 => 65538,
        }
    }

    /// Number of distance codes in use
    pub fn num_dist_codes(self) -> usize {
        match self {
            Format::Deflate => 30,
            Format::Deflate64 => 32,
        }
    }

    /// Extra bits carried by length slot `slot` (0-28)
    #[inline]
    pub fn length_extra_bits(self, slot: usize) -> u8 {
        if slot == 28 && self == Format::Deflate64 {
            16
        } else {
            LENGTH_TABLE[slot].1
        }
    }

    /// Base length of length slot `slot` (0-28)
    #[inline]
    pub fn length_base(self, slot: usize) -> u32 {
        if slot == 28 && self == Format::Deflate64 {
            3
        } else {
            LENGTH_TABLE[slot].0 as u32
        }
    }
}

pub const MATCH_MIN_LEN: usize = 3;

/// End-of-block symbol in the literal/length alphabet
pub const END_OF_BLOCK: usize = 256;

/// First length symbol in the literal/length alphabet
pub const MATCH_SYMBOL_BASE: usize = 257;

/// Literal/length symbols that may appear in a stream
pub const NUM_LIT_LEN_SYMBOLS: usize = 286;

/// Literal/length table size, including the two reserved fixed-code symbols
pub const FIXED_LIT_LEN_TABLE_SIZE: usize = 288;

/// Distance table size, large enough for Deflate64
pub const DIST_TABLE_SIZE: usize = 32;

/// Code-length alphabet size
pub const NUM_CODE_LENGTH_SYMBOLS: usize = 19;

/// Largest stored block payload
pub const MAX_STORED_BLOCK_SIZE: usize = 0xFFFF;

/// Length codes 257-285: base length and extra bits
/// Index by (code - 257)
pub const LENGTH_TABLE: [(u16, u8); 29] = [
    // (base_length, extra_bits)
    (3, 0),   // 257
    (4, 0),   // 258
    (5, 0),   // 259
    (6, 0),   // 260
    (7, 0),   // 261
    (8, 0),   // 262
    (9, 0),   // 263
    (10, 0),  // 264
    (11, 1),  // 265
    (13, 1),  // 266
    (15, 1),  // 267
    (17, 1),  // 268
    (19, 2),  // 269
    (23, 2),  // 270
    (27, 2),  // 271
    (31, 2),  // 272
    (35, 3),  // 273
    (43, 3),  // 274
    (51, 3),  // 275
    (59, 3),  // 276
    (67, 4),  // 277
    (83, 4),  // 278
    (99, 4),  // 279
    (115, 4), // 280
    (131, 5), // 281
    (163, 5), // 282
    (195, 5), // 283
    (227, 5), // 284
    (258, 0), // 285 - Deflate64: base 3, 16 extra bits
];

/// Distance codes 0-31: base distance and extra bits
/// Codes 30 and 31 are only valid in Deflate64.
pub const DISTANCE_TABLE: [(u32, u8); 32] = [
    // (base_distance, extra_bits)
    (1, 0),      // 0
    (2, 0),      // 1
    (3, 0),      // 2
    (4, 0),      // 3
    (5, 1),      // 4
    (7, 1),      // 5
    (9, 2),      // 6
    (13, 2),     // 7
    (17, 3),     // 8
    (25, 3),     // 9
    (33, 4),     // 10
    (49, 4),     // 11
    (65, 5),     // 12
    (97, 5),     // 13
    (129, 6),    // 14
    (193, 6),    // 15
    (257, 7),    // 16
    (385, 7),    // 17
    (513, 8),    // 18
    (769, 8),    // 19
    (1025, 9),   // 20
    (1537, 9),   // 21
    (2049, 10),  // 22
    (3073, 10),  // 23
    (4097, 11),  // 24
    (6145, 11),  // 25
    (8193, 12),  // 26
    (12289, 12), // 27
    (16385, 13), // 28
    (24577, 13), // 29
    (32769, 14), // 30
    (49153, 14), // 31
];

/// Order of code length alphabet for dynamic Huffman blocks
pub const CODE_LENGTH_ORDER: [usize; 19] =
    [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

/// Length slot for `length - 3` in 0..=255, ignoring the 258 special case
const LEN_SLOTS: [u8; 256] = build_len_slots();

const fn build_len_slots() -> [u8; 256] {
    let mut slots = [0u8; 256];
    let mut slot = 0;
    while slot < 28 {
        let base = LENGTH_TABLE[slot].0 as usize - MATCH_MIN_LEN;
        let count = 1usize << LENGTH_TABLE[slot].1;
        let mut i = 0;
        while i < count && base + i < 256 {
            slots[base + i] = slot as u8;
            i += 1;
        }
        slot += 1;
    }
    slots
}

/// Length slot (0-28) for a match length
#[inline]
pub fn length_slot(format: Format, length: u32) -> usize {
    let l0 = length as usize - MATCH_MIN_LEN;
    match format {
        Format::Deflate if length == 258 => 28,
        Format::Deflate64 if l0 >= 256 => 28,
        _ => LEN_SLOTS[l0] as usize,
    }
}

/// Distance slot (0-31) for a distance of 1 or more
#[inline]
pub fn distance_slot(distance: u32) -> usize {
    let d0 = distance - 1;
    if d0 < 4 {
        return d0 as usize;
    }
    let k = 31 - d0.leading_zeros();
    (2 * k + ((d0 >> (k - 1)) & 1)) as usize
}

/// Decode a length value from a length code (257-285) and extra bits
pub fn decode_length(format: Format, code: u16, extra_bits: u32) -> Option<u32> {
    if !(257..=285).contains(&code) {
        return None;
    }
    Some(format.length_base((code - 257) as usize) + extra_bits)
}

/// Decode a distance value from a distance code and extra bits
pub fn decode_distance(format: Format, code: u16, extra_bits: u32) -> Option<u32> {
    if code as usize >= format.num_dist_codes() {
        return None;
    }
    let (base, _) = DISTANCE_TABLE[code as usize];
    Some(base + extra_bits)
}

/// Length code, extra value and extra bit count for a valid match length
pub fn encode_length(format: Format, length: u32) -> (u16, u32, u8) {
    debug_assert!((MATCH_MIN_LEN as u32..=format.match_max_len() as u32).contains(&length));
    let slot = length_slot(format, length);
    (
        (MATCH_SYMBOL_BASE + slot) as u16,
        length - format.length_base(slot),
        format.length_extra_bits(slot),
    )
}

/// Distance code, extra value and extra bit count for a distance in
/// `1..=history_size`
pub fn encode_distance(distance: u32) -> (u16, u32, u8) {
    let slot = distance_slot(distance);
    let (base, extra_bits) = DISTANCE_TABLE[slot];
    (slot as u16, distance - base, extra_bits)
}
