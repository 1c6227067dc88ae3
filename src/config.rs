use crate::deflate::tables::Format;
use crate::error::{Error, Result};
use std::str::FromStr;

/// Compression level (0-9)
///
/// - Level 0: stored blocks only
/// - Levels 1-6: hash-chain match finder with greedy parsing
/// - Levels 7-8: binary-tree match finder with optimal parsing, 3 passes
/// - Level 9: binary-tree match finder with optimal parsing, 10 passes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionLevel {
    Level0 = 0,
    Level1 = 1,
    Level2 = 2,
    Level3 = 3,
    Level4 = 4,
    #[default]
    Level5 = 5,
    Level6 = 6,
    Level7 = 7,
    Level8 = 8,
    Level9 = 9,
}

impl CompressionLevel {
    /// Create from numeric level (0-9), clamped to valid range
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Level0,
            1 => Self::Level1,
            2 => Self::Level2,
            3 => Self::Level3,
            4 => Self::Level4,
            5 => Self::Level5,
            6 => Self::Level6,
            7 => Self::Level7,
            8 => Self::Level8,
            _ => Self::Level9,
        }
    }

    /// Get numeric level (0-9)
    pub fn level(&self) -> u8 {
        *self as u8
    }

    /// Whether this level writes stored blocks only
    pub fn is_store(&self) -> bool {
        *self == Self::Level0
    }
}

impl TryFrom<u8> for CompressionLevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidArgument(format!("compression level {level} (0-9)")));
        }
        Ok(Self::from_level(level))
    }
}

/// Literal/match selection strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    /// Take the longest match at each position
    Fast,
    /// Cost-driven optimal parse
    Normal,
}

/// Match finder index structure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchFinderKind {
    HashChain,
    BinaryTree,
}

impl FromStr for MatchFinderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hc" | "hc4" => Ok(Self::HashChain),
            "bt" | "bt3" => Ok(Self::BinaryTree),
            other => Err(Error::InvalidArgument(format!("unknown match finder '{other}'"))),
        }
    }
}

/// Thresholds steering block trials and splitting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTuning {
    /// Largest token count for which the fixed-table candidate is priced
    pub fixed_block_max_values: usize,
    /// Smallest token count of a block worth dividing
    pub divide_min_values: usize,
    /// Smallest byte size of each half of a divided block
    pub divide_min_block: usize,
    /// Token budget of a top-level block: `value_block_base + value_block_per_div * div_passes`
    pub value_block_base: usize,
    pub value_block_per_div: usize,
    /// Huffman length limit by token count, checked in order; `default_huffman_bits` otherwise
    pub huffman_bit_steps: [(usize, u8); 3],
    pub default_huffman_bits: u8,
}

impl Default for BlockTuning {
    fn default() -> Self {
        Self {
            fixed_block_max_values: 1 << 8,
            divide_min_values: 1 << 7,
            divide_min_block: 1 << 6,
            value_block_base: 7 << 10,
            value_block_per_div: 1 << 12,
            huffman_bit_steps: [(18000, 12), (7000, 11), (2000, 10)],
            default_huffman_bits: 9,
        }
    }
}

impl BlockTuning {
    /// Huffman length limit for a block of `num_values` tokens
    pub fn huffman_bits(&self, num_values: usize) -> u8 {
        self.huffman_bit_steps
            .iter()
            .find(|&&(above, _)| num_values > above)
            .map_or(self.default_huffman_bits, |&(_, bits)| bits)
    }
}

/// Encoder configuration
///
/// Options left as `None` are derived from `level`.
#[derive(Clone, Debug, Default)]
pub struct EncoderConfig {
    pub level: CompressionLevel,
    /// Match length that ends the optimal search early (3-258)
    pub num_fast_bytes: Option<usize>,
    pub match_finder: Option<MatchFinderKind>,
    /// Candidates examined per position (at least 1)
    pub match_finder_cycles: Option<u32>,
    /// Block splitting and refinement effort (1-64)
    pub num_passes: Option<u32>,
    pub algorithm: Option<Algorithm>,
    /// Emit Deflate64 instead of DEFLATE
    pub deflate64: bool,
    pub tuning: BlockTuning,
}

/// Fully resolved encoder parameters
#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub format: Format,
    pub stored_only: bool,
    pub fast_bytes: usize,
    pub match_finder: MatchFinderKind,
    pub cycles: u32,
    /// Price refinement passes per dynamic trial
    pub num_passes: u32,
    /// Depth of recursive block splitting
    pub num_div_passes: u32,
    pub fast_mode: bool,
    pub tuning: BlockTuning,
}

/// Deepest block split
pub const MAX_DIV_PASSES: u32 = 10;

impl EncoderConfig {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level, ..Self::default() }
    }

    /// Validate and fill unset options from the level
    pub fn resolve(&self) -> Result<EncoderSettings> {
        let level = self.level.level();
        let fast_bytes = self.num_fast_bytes.unwrap_or(match level {
            0..=6 => 32,
            7 | 8 => 64,
            _ => 128,
        });
        if !(3..=258).contains(&fast_bytes) {
            return Err(Error::InvalidArgument(format!("fast bytes {fast_bytes} (3-258)")));
        }

        let algorithm = self.algorithm.unwrap_or(if level < 7 {
            Algorithm::Fast
        } else {
            Algorithm::Normal
        });
        let match_finder = self.match_finder.unwrap_or(match algorithm {
            Algorithm::Fast => MatchFinderKind::HashChain,
            Algorithm::Normal => MatchFinderKind::BinaryTree,
        });

        let cycles = self.match_finder_cycles.unwrap_or(16 + (fast_bytes as u32 >> 1));
        if cycles == 0 {
            return Err(Error::InvalidArgument("match finder cycles must be at least 1".into()));
        }

        let passes = self.num_passes.unwrap_or(match level {
            0..=6 => 1,
            7 | 8 => 3,
            _ => 10,
        });
        if !(1..=64).contains(&passes) {
            return Err(Error::InvalidArgument(format!("passes {passes} (1-64)")));
        }
        let (num_div_passes, num_passes) = match passes {
            1 => (1, 1),
            n if n <= MAX_DIV_PASSES => (n, 2),
            n => (MAX_DIV_PASSES, n - 8),
        };

        Ok(EncoderSettings {
            format: if self.deflate64 { Format::Deflate64 } else { Format::Deflate },
            stored_only: self.level.is_store(),
            fast_bytes,
            match_finder,
            cycles,
            num_passes,
            num_div_passes,
            fast_mode: algorithm == Algorithm::Fast,
            tuning: self.tuning.clone(),
        })
    }

    /// Apply comma-separated `key=value` properties
    ///
    /// Keys: `fb` fast bytes, `mc` match finder cycles, `pass` passes, `mf`
    /// match finder (`hc4`/`bt3`), `a` algorithm (0 fast, 1 normal), `x` level,
    /// `d64` Deflate64 (`on`/`off`).
    pub fn apply_properties(&mut self, props: &str) -> Result<()> {
        for item in props.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| Error::InvalidArgument(format!("property '{item}' has no value")))?;
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "fb" => self.num_fast_bytes = Some(parse_number(key, value)?),
                "mc" => self.match_finder_cycles = Some(parse_number(key, value)?),
                "pass" => self.num_passes = Some(parse_number(key, value)?),
                "mf" => self.match_finder = Some(value.parse()?),
                "a" => {
                    self.algorithm = Some(match value {
                        "0" => Algorithm::Fast,
                        "1" => Algorithm::Normal,
                        _ => return Err(bad_value(key, value)),
                    })
                }
                "x" => self.level = CompressionLevel::try_from(parse_number::<u8>(key, value)?)?,
                "d64" => {
                    self.deflate64 = match value.to_ascii_lowercase().as_str() {
                        "on" | "1" | "true" | "+" => true,
                        "off" | "0" | "false" | "-" => false,
                        _ => return Err(bad_value(key, value)),
                    }
                }
                _ => return Err(Error::InvalidArgument(format!("unknown property '{key}'"))),
            }
        }
        self.resolve().map(|_| ())
    }
}

fn bad_value(key: &str, value: &str) -> Error {
    Error::InvalidArgument(format!("bad value '{value}' for property '{key}'"))
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| bad_value(key, value))
}

/// Decoder configuration
#[derive(Clone, Debug, Default)]
pub struct DecoderConfig {
    /// Stop after this many bytes; a stream ending earlier is an error
    pub expected_size: Option<u64>,
    /// Accept Deflate64 length and distance codes
    pub deflate64: bool,
    /// Keep the source when the decoder is closed
    pub leave_open: bool,
}

impl DecoderConfig {
    pub fn format(&self) -> Format {
        if self.deflate64 {
            Format::Deflate64
        } else {
            Format::Deflate
        }
    }
}
