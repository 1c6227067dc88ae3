use crate::bits::{reverse_bits, BitWriter};

/// Maximum code length for literal/length and distance alphabets (RFC 1951)
pub const MAX_CODE_LENGTH: u8 = 15;

/// Maximum code length for the code length alphabet
pub const MAX_CL_CODE_LENGTH: u8 = 7;

/// Extra bits following code length symbols 16, 17 and 18
pub const CODE_LENGTH_EXTRA_BITS: [u8; 19] =
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 3, 7];

/// Compute length-limited Huffman code lengths for the given frequencies.
///
/// Symbols are ordered by frequency (ties by symbol), merged with two queues
/// recording parent links, and depths are assigned walking from the root down.
/// A depth reaching `max_len` is moved to the deepest shorter level that still
/// has a free slot, which keeps the Kraft sum at exactly one. Longest codes go
/// to the least frequent symbols.
///
/// With fewer than two used symbols, two 1-bit codes are assigned anyway
/// (symbol 0 plus the used symbol, or symbol 1) so that the table is complete.
pub fn build_code_lengths(freqs: &[u32], max_len: u8) -> Vec<u8> {
    debug_assert!(freqs.len() >= 2);
    debug_assert!((1..=16).contains(&max_len));

    let mut lens = vec![0u8; freqs.len()];
    let mut leaves: Vec<(u32, u16)> = freqs
        .iter()
        .enumerate()
        .filter(|(_, &f)| f != 0)
        .map(|(sym, &f)| (f, sym as u16))
        .collect();
    leaves.sort_unstable();

    if leaves.len() < 2 {
        let second = match leaves.first() {
            Some(&(_, sym)) if sym != 0 => sym as usize,
            _ => 1,
        };
        lens[0] = 1;
        lens[second] = 1;
        return lens;
    }

    let n = leaves.len();
    let mut node_freq = vec![0u64; n - 1];
    let mut node_parent = vec![0usize; n - 1];
    let (mut leaf, mut node) = (0usize, 0usize);
    for e in 0..n - 1 {
        let mut freq = 0u64;
        for _ in 0..2 {
            if leaf != n && (node == e || leaves[leaf].0 as u64 <= node_freq[node]) {
                freq += leaves[leaf].0 as u64;
                leaf += 1;
            } else {
                freq += node_freq[node];
                node_parent[node] = e;
                node += 1;
            }
        }
        node_freq[e] = freq;
    }

    let max = max_len as usize;
    let mut depth = vec![0usize; n - 1];
    let mut counters = vec![0u32; max + 2];
    counters[1] = 2;
    for e in (0..n - 2).rev() {
        let d = depth[node_parent[e]] + 1;
        depth[e] = d;
        let mut len = d;
        if len >= max {
            len = max - 1;
            while counters[len] == 0 {
                len -= 1;
            }
        }
        counters[len] -= 1;
        counters[len + 1] += 2;
    }

    let mut next = 0;
    for len in (1..=max).rev() {
        for _ in 0..counters[len] {
            lens[leaves[next].1 as usize] = len as u8;
            next += 1;
        }
    }
    lens
}

/// Assign canonical codes (MSB-first values) from code lengths
pub fn canonical_codes(lengths: &[u8]) -> Vec<u32> {
    let mut bl_count = [0u32; 17];
    for &len in lengths {
        if len > 0 {
            bl_count[len as usize] += 1;
        }
    }

    let mut next_code = [0u32; 17];
    let mut code = 0u32;
    for bits in 1..17 {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return 0;
            }
            let c = next_code[len as usize];
            next_code[len as usize] += 1;
            c
        })
        .collect()
}

/// Bit cost of coding `freqs` with `lens`, plus extra bits for symbols from
/// `extra_base` onwards (`extra_bits[i]` applies to symbol `extra_base + i`)
pub fn table_price(freqs: &[u32], lens: &[u8], extra_bits: &[u8], extra_base: usize) -> u32 {
    let coded: u32 = freqs.iter().zip(lens).map(|(&f, &l)| f * l as u32).sum();
    let extra: u32 = freqs
        .iter()
        .skip(extra_base)
        .zip(extra_bits)
        .map(|(&f, &e)| f * e as u32)
        .sum();
    coded + extra
}

/// Run-length encode a code length sequence with symbols 16, 17 and 18
///
/// Returns `(symbol, extra_value)` pairs. Runs of a non-zero length start with
/// the length itself unless they continue the previous run.
pub fn run_length_encode(lengths: &[u8]) -> Vec<(u8, u8)> {
    let mut result = Vec::new();
    let Some(&first) = lengths.first() else {
        return result;
    };

    let mut prev_len: u16 = 0xFF;
    let mut next_len = first as u16;
    let (mut max_count, mut min_count) = if next_len == 0 { (138, 3) } else { (7, 4) };
    let mut count = 0u8;

    for n in 0..lengths.len() {
        let cur = next_len;
        next_len = lengths.get(n + 1).map_or(0xFF, |&l| l as u16);
        count += 1;
        if count < max_count && cur == next_len {
            continue;
        }

        if count < min_count {
            for _ in 0..count {
                result.push((cur as u8, 0));
            }
        } else if cur != 0 {
            if cur != prev_len {
                result.push((cur as u8, 0));
                count -= 1;
            }
            result.push((16, count - 3));
        } else if count <= 10 {
            result.push((17, count - 3));
        } else {
            result.push((18, count - 11));
        }

        count = 0;
        prev_len = cur;
        (max_count, min_count) = if next_len == 0 {
            (138, 3)
        } else if cur == next_len {
            (6, 3)
        } else {
            (7, 4)
        };
    }

    result
}

/// Add the code length symbol counts of `runs` to `freqs`
pub fn count_code_length_symbols(runs: &[(u8, u8)], freqs: &mut [u32; 19]) {
    for &(sym, _) in runs {
        freqs[sym as usize] += 1;
    }
}

/// Huffman code table for writing symbols
#[derive(Clone, Debug)]
pub struct HuffmanEncoder {
    /// Bit-reversed codes, ready for the LSB-first writer
    codes: Vec<u32>,
    lengths: Vec<u8>,
}

impl HuffmanEncoder {
    pub fn from_lengths(lengths: &[u8]) -> Self {
        let codes = canonical_codes(lengths)
            .into_iter()
            .zip(lengths)
            .map(|(code, &len)| reverse_bits(code, len))
            .collect();
        Self { codes, lengths: lengths.to_vec() }
    }

    /// Write the code for `symbol`
    #[inline]
    pub fn write(&self, writer: &mut BitWriter, symbol: usize) {
        debug_assert!(self.lengths[symbol] > 0, "symbol {symbol} has no code");
        writer.write_bits(self.codes[symbol], self.lengths[symbol]);
    }

    /// Write run-length encoded code lengths with this code length table
    pub fn write_runs(&self, writer: &mut BitWriter, runs: &[(u8, u8)]) {
        for &(sym, extra) in runs {
            self.write(writer, sym as usize);
            let bits = CODE_LENGTH_EXTRA_BITS[sym as usize];
            if bits > 0 {
                writer.write_bits(extra as u32, bits);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kraft_sum(lengths: &[u8]) -> f64 {
        lengths.iter().filter(|&&l| l > 0).map(|&l| 2f64.powi(-(l as i32))).sum()
    }

    #[test]
    fn test_canonical_codes_rfc_example() {
        // RFC 1951 section 3.2.2 example: ABCDEFGH with lengths (3, 3, 3, 3, 3, 2, 4, 4)
        let codes = canonical_codes(&[3, 3, 3, 3, 3, 2, 4, 4]);
        assert_eq!(codes, vec![0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111]);
    }

    #[test]
    fn test_build_code_lengths_equal() {
        let lengths = build_code_lengths(&[1, 1, 1, 1], 15);
        assert_eq!(lengths, vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_build_code_lengths_skewed() {
        let freqs = [100u32, 1, 1, 1, 0];
        let lengths = build_code_lengths(&freqs, 15);
        assert_eq!(lengths[0], 1);
        assert_eq!(lengths[4], 0);
        assert!((kraft_sum(&lengths) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_build_code_lengths_respects_limit() {
        // Fibonacci frequencies produce a maximally deep tree
        let mut freqs = vec![1u32, 1];
        while freqs.len() < 30 {
            let n = freqs.len();
            freqs.push(freqs[n - 1] + freqs[n - 2]);
        }
        let unlimited = build_code_lengths(&freqs, 16);
        assert!(unlimited.iter().any(|&l| l > 9));

        let lengths = build_code_lengths(&freqs, 9);
        assert!(lengths.iter().all(|&l| (1..=9).contains(&l)));
        assert!((kraft_sum(&lengths) - 1.0).abs() < 1e-9);
        // More frequent symbols never get longer codes
        for i in 1..lengths.len() {
            assert!(lengths[i] <= lengths[i - 1]);
        }
    }

    #[test]
    fn test_build_code_lengths_degenerate() {
        assert_eq!(build_code_lengths(&[0, 0, 0, 0], 15), vec![1, 1, 0, 0]);
        assert_eq!(build_code_lengths(&[0, 0, 7, 0], 15), vec![1, 0, 1, 0]);
        assert_eq!(build_code_lengths(&[7, 0, 0, 0], 15), vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_table_price() {
        let freqs = [2u32, 1, 3, 4];
        let lens = [1u8, 2, 3, 3];
        // Symbols 2 and 3 carry 1 and 2 extra bits
        assert_eq!(table_price(&freqs, &lens, &[1, 2], 2), 2 + 2 + 9 + 12 + 3 + 8);
    }

    #[test]
    fn test_rle_encode_zeros() {
        let encoded = run_length_encode(&[0u8; 20]);
        assert_eq!(encoded, vec![(18, 9)]);

        let encoded = run_length_encode(&[0u8; 140]);
        assert_eq!(encoded, vec![(18, 127), (0, 0), (0, 0)]);

        let encoded = run_length_encode(&[0u8; 5]);
        assert_eq!(encoded, vec![(17, 2)]);
    }

    #[test]
    fn test_rle_encode_repeat() {
        // First 5, then repeat 6, then a continuation run of 3 with no literal
        let encoded = run_length_encode(&[5u8; 10]);
        assert_eq!(encoded, vec![(5, 0), (16, 3), (16, 0)]);

        let encoded = run_length_encode(&[5, 5, 5, 8]);
        assert_eq!(encoded, vec![(5, 0), (5, 0), (5, 0), (8, 0)]);
    }

    #[test]
    fn test_rle_expands_back() {
        let lengths: Vec<u8> = [vec![8u8; 144], vec![9; 112], vec![7; 24], vec![0; 30], vec![8; 8]]
            .concat();
        let mut expanded = Vec::new();
        for (sym, extra) in run_length_encode(&lengths) {
            match sym {
                16 => {
                    let prev = *expanded.last().unwrap();
                    expanded.extend(std::iter::repeat(prev).take(3 + extra as usize));
                }
                17 => expanded.extend(std::iter::repeat(0).take(3 + extra as usize)),
                18 => expanded.extend(std::iter::repeat(0).take(11 + extra as usize)),
                len => expanded.push(len),
            }
        }
        assert_eq!(expanded, lengths);
    }
}
