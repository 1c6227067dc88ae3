use super::block::{BlockEncoder, Levels};
use super::tables::{
    distance_slot, length_slot, Format, DISTANCE_TABLE, DIST_TABLE_SIZE, MATCH_MIN_LEN,
    MATCH_SYMBOL_BASE, MAX_STORED_BLOCK_SIZE,
};
use super::tokens::Match;

/// Positions the optimal parser looks ahead before it must commit
pub const NUM_OPTS: usize = 1 << 12;

/// Match cache size in `u32` entries
pub const MATCH_ARRAY_SIZE: usize = MAX_STORED_BLOCK_SIZE * 10;
/// A parse chunk ends once the cache passes this point
pub const MATCH_ARRAY_LIMIT: usize = MATCH_ARRAY_SIZE - 258 * 4 * 2;

const INFINITY_PRICE: u32 = 0x0FFF_FFFF;

// Prices assumed for symbols without a code in the pricing tables
const NO_LITERAL_PRICE: u8 = 11;
const NO_LEN_PRICE: u8 = 11;
const NO_DIST_PRICE: u8 = 6;

/// Node of the optimal parse graph: the cheapest known way to reach a
/// position and the step that got there
#[derive(Clone, Copy, Debug, Default)]
pub struct Optimal {
    pub price: u32,
    pub pos_prev: usize,
    pub back_prev: u32,
}

/// Bit costs of literals, lengths and distance slots under a set of code
/// lengths
#[derive(Clone, Debug)]
pub struct Prices {
    literal: [u8; 256],
    /// Indexed by `length - 3`
    length: [u8; 256],
    distance: [u8; DIST_TABLE_SIZE],
}

impl Prices {
    pub(super) fn new(levels: &Levels, format: Format) -> Self {
        let mut prices =
            Self { literal: [0; 256], length: [0; 256], distance: [0; DIST_TABLE_SIZE] };
        prices.update(levels, format);
        prices
    }

    pub(super) fn update(&mut self, levels: &Levels, format: Format) {
        for (price, &level) in self.literal.iter_mut().zip(&levels.lit_len[..256]) {
            *price = if level != 0 { level } else { NO_LITERAL_PRICE };
        }
        for (l0, price) in self.length.iter_mut().enumerate() {
            let slot = length_slot(format, (l0 + MATCH_MIN_LEN) as u32);
            let level = levels.lit_len[MATCH_SYMBOL_BASE + slot];
            *price = if level != 0 { level } else { NO_LEN_PRICE } + format.length_extra_bits(slot);
        }
        for (slot, price) in self.distance.iter_mut().enumerate() {
            let level = levels.dist[slot];
            *price = if level != 0 { level } else { NO_DIST_PRICE } + DISTANCE_TABLE[slot].1;
        }
    }

    #[inline]
    fn literal(&self, byte: u8) -> u32 {
        self.literal[byte as usize] as u32
    }

    #[inline]
    fn match_price(&self, len: usize, dist: u32) -> u32 {
        self.length[len - MATCH_MIN_LEN] as u32 + self.distance[distance_slot(dist)] as u32
    }
}

impl BlockEncoder {
    /// Fill `matches` for the next position, from the cache on replay passes
    pub(super) fn get_matches(&mut self) {
        if self.multi_pass && self.second_pass {
            let count = self.cache[self.cache_pos] as usize;
            let start = self.cache_pos + 1;
            let entries = &self.cache[start..start + count * 2];
            self.matches.clear();
            self.matches.extend(entries.chunks_exact(2).map(|e| Match { len: e[0], dist: e[1] }));
            self.cache_pos = start + count * 2;
            return;
        }

        self.mf.get_matches(&mut self.matches);
        if self.multi_pass {
            self.cache[self.cache_pos] = self.matches.len() as u32;
            let mut p = self.cache_pos + 1;
            for m in &self.matches {
                self.cache[p] = m.len;
                self.cache[p + 1] = m.dist;
                p += 2;
            }
            self.cache_pos = p;
        }
        if !self.second_pass {
            self.additional_offset += 1;
        }
    }

    /// Skip `n` positions the parse has already committed to
    pub(super) fn move_pos(&mut self, n: usize) {
        if !self.second_pass && n > 0 {
            self.mf.skip(n);
            self.additional_offset += n;
        }
    }

    /// Byte at `cur` positions past the parse position
    #[inline]
    fn literal_at(&self, cur: usize) -> u8 {
        self.mf.window().byte_behind(self.additional_offset - cur)
    }

    /// Next token of a greedy parse: the longest match, else a literal
    ///
    /// Returns `(length, distance)`; a length below 3 is a literal.
    pub(super) fn get_optimal_fast(&mut self) -> (usize, u32) {
        self.get_matches();
        match self.matches.last().copied() {
            None => (1, 0),
            Some(m) => {
                let len = m.len as usize;
                self.move_pos(len - 1);
                (len, m.dist)
            }
        }
    }

    /// Next token of the price-optimal parse
    ///
    /// A chunk of up to `NUM_OPTS` positions is solved as a shortest path
    /// over literal and match edges; its tokens are then handed out one per
    /// call. A match longer than the fast-bytes limit is taken immediately.
    pub(super) fn get_optimal(&mut self) -> (usize, u32) {
        if self.optimum_end != self.optimum_cur {
            let cur = self.optimum_cur;
            let next = self.optimum[cur].pos_prev;
            self.optimum_cur = next;
            return (next - cur, self.optimum[cur].back_prev);
        }
        self.optimum_cur = 0;
        self.optimum_end = 0;

        self.get_matches();
        let Some(longest) = self.matches.last().copied() else {
            return (1, 0);
        };
        let len_main = longest.len as usize;
        if len_main > self.fast_bytes {
            self.move_pos(len_main - 1);
            return (len_main, longest.dist);
        }

        self.optimum[1].price = self.prices.literal(self.literal_at(0));
        self.optimum[1].pos_prev = 0;
        self.optimum[2].price = INFINITY_PRICE;
        self.optimum[2].pos_prev = 1;

        let mut offs = 0;
        for len in MATCH_MIN_LEN..=len_main {
            let m = self.matches[offs];
            let price = self.prices.match_price(len, m.dist);
            self.optimum[len] = Optimal { price, pos_prev: 0, back_prev: m.dist };
            if len == m.len as usize {
                offs += 1;
            }
        }

        let mut cur = 0;
        let mut len_end = len_main;
        loop {
            cur += 1;
            if cur == len_end || cur == NUM_OPTS || self.cache_pos >= MATCH_ARRAY_LIMIT {
                return self.backward(cur);
            }

            self.get_matches();
            let num_matches = self.matches.len();
            let new_len = self.matches.last().map_or(0, |m| m.len as usize);
            if new_len > self.fast_bytes {
                let dist = self.matches[num_matches - 1].dist;
                let first = self.backward(cur);
                self.optimum[cur].back_prev = dist;
                self.optimum_end = cur + new_len;
                self.optimum[cur].pos_prev = self.optimum_end;
                self.move_pos(new_len - 1);
                return first;
            }

            let cur_price = self.optimum[cur].price;
            let with_literal = cur_price + self.prices.literal(self.literal_at(cur));
            let next = &mut self.optimum[cur + 1];
            if with_literal < next.price {
                next.price = with_literal;
                next.pos_prev = cur;
            }
            if num_matches == 0 {
                continue;
            }

            while len_end < cur + new_len {
                len_end += 1;
                self.optimum[len_end].price = INFINITY_PRICE;
            }

            let mut offs = 0;
            let mut dist = self.matches[0].dist;
            for len in MATCH_MIN_LEN..=new_len {
                let price = cur_price + self.prices.match_price(len, dist);
                let opt = &mut self.optimum[cur + len];
                if price < opt.price {
                    *opt = Optimal { price, pos_prev: cur, back_prev: dist };
                }
                if len == self.matches[offs].len as usize {
                    offs += 1;
                    if offs == num_matches {
                        break;
                    }
                    dist = self.matches[offs].dist;
                }
            }
        }
    }

    /// Turn the back links ending at `cur` into forward links and return the
    /// first step
    fn backward(&mut self, mut cur: usize) -> (usize, u32) {
        self.optimum_end = cur;
        let mut pos_mem = self.optimum[cur].pos_prev;
        let mut back_mem = self.optimum[cur].back_prev;
        loop {
            let pos_prev = pos_mem;
            let back_cur = back_mem;
            back_mem = self.optimum[pos_prev].back_prev;
            pos_mem = self.optimum[pos_prev].pos_prev;
            self.optimum[pos_prev].back_prev = back_cur;
            self.optimum[pos_prev].pos_prev = cur;
            cur = pos_prev;
            if cur == 0 {
                break;
            }
        }
        self.optimum_cur = self.optimum[0].pos_prev;
        (self.optimum_cur, self.optimum[0].back_prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressionLevel, EncoderConfig};

    fn encoder(level: u8, data: &[u8]) -> BlockEncoder {
        let settings = EncoderConfig::new(CompressionLevel::from_level(level)).resolve().unwrap();
        let mut enc = BlockEncoder::new(&settings);
        assert_eq!(enc.fill(data), data.len());
        enc
    }

    /// Drive the parser the way a block trial does
    fn parse(enc: &mut BlockEncoder, total: usize, optimal: bool) -> Vec<(usize, u32)> {
        let mut tokens = Vec::new();
        let mut done = 0;
        while done < total {
            let (len, dist) = if optimal { enc.get_optimal() } else { enc.get_optimal_fast() };
            enc.additional_offset -= len;
            done += len;
            tokens.push((len, if len >= MATCH_MIN_LEN { dist } else { 0 }));
        }
        tokens
    }

    #[test]
    fn test_prices_follow_levels() {
        let prices = Prices::new(&Levels::initial(), Format::Deflate);
        assert_eq!(prices.literal(b'x'), 8);
        // length 3 is slot 0 without extra bits; 258 is slot 28
        assert_eq!(prices.match_price(3, 1), 5 + 5);
        assert_eq!(prices.match_price(258, 1), 5 + 5);
        // length 257 is slot 27 with 5 extra bits; distance 5 has 1 extra bit
        assert_eq!(prices.match_price(257, 5), 5 + 5 + 5 + 1);

        let prices64 = Prices::new(&Levels::initial(), Format::Deflate64);
        assert_eq!(prices64.match_price(258, 1), 5 + 5 + 5);
    }

    #[test]
    fn test_missing_codes_get_default_prices() {
        let mut levels = Levels::initial();
        levels.lit_len[b'q' as usize] = 0;
        levels.lit_len[MATCH_SYMBOL_BASE] = 0;
        levels.dist[0] = 0;
        let prices = Prices::new(&levels, Format::Deflate);
        assert_eq!(prices.literal(b'q'), NO_LITERAL_PRICE as u32);
        assert_eq!(prices.match_price(3, 1), (NO_LEN_PRICE + NO_DIST_PRICE) as u32);
    }

    #[test]
    fn test_optimal_takes_run_as_one_match() {
        let mut enc = encoder(9, b"aaaaaaaaaa");
        assert_eq!(parse(&mut enc, 10, true), vec![(1, 0), (9, 1)]);
    }

    #[test]
    fn test_fast_takes_longest_match() {
        let mut enc = encoder(1, b"abcdabcdabcd");
        assert_eq!(parse(&mut enc, 12, false), vec![(1, 0), (1, 0), (1, 0), (1, 0), (8, 4)]);
    }

    #[test]
    fn test_optimal_single_match_after_literals() {
        let data = b"abcdefgh__abcdefgh";
        let mut enc = encoder(9, data);
        let tokens = parse(&mut enc, data.len(), true);
        assert_eq!(tokens.last(), Some(&(8, 10)));
        assert_eq!(tokens.iter().map(|t| t.0).sum::<usize>(), data.len());
    }

    #[test]
    fn test_long_match_beyond_fast_bytes() {
        let data = vec![b'z'; 1000];
        let mut enc = encoder(5, &data);
        let tokens = parse(&mut enc, data.len(), true);
        assert_eq!(tokens[0], (1, 0));
        assert_eq!(tokens[1], (258, 1));
    }
}
