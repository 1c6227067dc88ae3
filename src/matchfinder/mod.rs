//! LZ77 match finders over an [`InputWindow`].
//!
//! Positions are tracked with a `u32` counter that starts at 1; a table entry
//! of 0 means "no position". When the counter approaches its limit, every
//! table is rebased by subtracting the same offset.

pub mod binary_tree;
pub mod hash_chain;

use crate::config::MatchFinderKind;
use crate::deflate::tables::{Format, MATCH_MIN_LEN};
use crate::deflate::tokens::Match;
use crate::window::InputWindow;

pub use binary_tree::BinaryTree;
pub use hash_chain::HashChain;

/// Counter value that triggers table normalization
const DEFAULT_NORMALIZE_LIMIT: u32 = u32::MAX - (1 << 18);

/// Everything a search strategy needs to know about the current position
pub struct SearchContext<'a> {
    /// Buffered input
    pub data: &'a [u8],
    /// Index of the current position in `data`
    pub cur: usize,
    /// Position counter of the current position
    pub pos: u32,
    /// Slot of the current position in per-position tables
    pub cyclic_pos: usize,
    pub cyclic_size: usize,
    /// Largest usable distance
    pub history: u32,
    /// Matches never extend past this many bytes
    pub len_limit: usize,
    pub cut_value: u32,
}

impl SearchContext<'_> {
    /// Per-position table slot of the position `delta` bytes back
    #[inline]
    pub fn cyclic_index(&self, delta: u32) -> usize {
        let delta = delta as usize;
        if delta > self.cyclic_pos {
            self.cyclic_pos + self.cyclic_size - delta
        } else {
            self.cyclic_pos - delta
        }
    }

    /// Distance to a stored position, if it is still inside the window
    #[inline]
    pub fn delta_to(&self, stored: u32) -> Option<u32> {
        if stored == 0 {
            return None;
        }
        let delta = self.pos - stored;
        (delta <= self.history).then_some(delta)
    }

    /// Length of the common prefix of the current position and `delta` bytes back
    #[inline]
    pub fn common_len(&self, delta: u32, from: usize) -> usize {
        let cur = &self.data[self.cur..self.cur + self.len_limit];
        let prev = &self.data[self.cur - delta as usize..];
        from + cur[from..].iter().zip(&prev[from..]).take_while(|(a, b)| a == b).count()
    }
}

/// Shared contract of the search strategies
pub trait MatchSearch {
    /// Insert the current position and append matches longer than any
    /// previous one to `out`
    fn get_matches(&mut self, ctx: &SearchContext<'_>, out: &mut Vec<Match>);

    /// Insert the current position without reporting matches
    fn skip(&mut self, ctx: &SearchContext<'_>);

    /// Subtract `offset` from every stored position, clamping to empty
    fn normalize(&mut self, offset: u32);
}

/// Rebase a table of stored positions
pub(crate) fn normalize_table(table: &mut [u32], offset: u32) {
    for value in table.iter_mut() {
        *value = value.saturating_sub(offset);
    }
}

/// Multiplicative hash of the first three bytes
#[inline]
pub(crate) fn hash3(data: &[u8], bits: u32) -> usize {
    let v = (data[0] as u32) << 16 | (data[1] as u32) << 8 | data[2] as u32;
    (v.wrapping_mul(0x9E37_79B1) >> (32 - bits)) as usize
}

/// Multiplicative hash of the first four bytes
#[inline]
pub(crate) fn hash4(data: &[u8], bits: u32) -> usize {
    let v = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    (v.wrapping_mul(0x9E37_79B1) >> (32 - bits)) as usize
}

/// Search strategy chosen once per stream
pub enum MatchIndex {
    HashChain(HashChain),
    BinaryTree(BinaryTree),
}

impl MatchSearch for MatchIndex {
    fn get_matches(&mut self, ctx: &SearchContext<'_>, out: &mut Vec<Match>) {
        match self {
            MatchIndex::HashChain(index) => index.get_matches(ctx, out),
            MatchIndex::BinaryTree(index) => index.get_matches(ctx, out),
        }
    }

    fn skip(&mut self, ctx: &SearchContext<'_>) {
        match self {
            MatchIndex::HashChain(index) => index.skip(ctx),
            MatchIndex::BinaryTree(index) => index.skip(ctx),
        }
    }

    fn normalize(&mut self, offset: u32) {
        match self {
            MatchIndex::HashChain(index) => index.normalize(offset),
            MatchIndex::BinaryTree(index) => index.normalize(offset),
        }
    }
}

/// Finds back-references at the cursor of an input window
pub struct MatchFinder {
    window: InputWindow,
    index: MatchIndex,
    pos: u32,
    cyclic_pos: usize,
    cyclic_size: usize,
    history: u32,
    nice_len: usize,
    match_max_len: usize,
    cut_value: u32,
    normalize_limit: u32,
}

impl MatchFinder {
    pub fn new(
        kind: MatchFinderKind,
        format: Format,
        nice_len: usize,
        cut_value: u32,
        window: InputWindow,
    ) -> Self {
        let history = format.history_size();
        let cyclic_size = history + 1;
        let index = match kind {
            MatchFinderKind::HashChain => MatchIndex::HashChain(HashChain::new(cyclic_size)),
            MatchFinderKind::BinaryTree => MatchIndex::BinaryTree(BinaryTree::new(cyclic_size)),
        };
        Self {
            window,
            index,
            pos: 1,
            cyclic_pos: 0,
            cyclic_size,
            history: history as u32,
            nice_len,
            match_max_len: format.match_max_len(),
            cut_value,
            normalize_limit: DEFAULT_NORMALIZE_LIMIT,
        }
    }

    /// Lower the counter value at which tables are rebased
    #[cfg(test)]
    pub(crate) fn with_normalize_limit(mut self, limit: u32) -> Self {
        self.normalize_limit = limit.max(self.history + 2);
        self
    }

    pub fn window(&self) -> &InputWindow {
        &self.window
    }

    /// Append input; returns the number of bytes taken
    pub fn fill(&mut self, data: &[u8]) -> usize {
        self.window.fill(data)
    }

    /// Bytes buffered at or after the cursor
    #[inline]
    pub fn available(&self) -> usize {
        self.window.lookahead()
    }

    /// Position counter of the cursor
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Collect matches at the cursor, in strictly increasing length order, and
    /// advance one position
    ///
    /// A match reaching the nice length is extended up to the format maximum.
    pub fn get_matches(&mut self, out: &mut Vec<Match>) {
        out.clear();
        let len_limit = self.nice_len.min(self.available());
        if len_limit < MATCH_MIN_LEN {
            self.move_pos();
            return;
        }

        let (data, cur) = self.window.buffer();
        let ctx = SearchContext {
            data,
            cur,
            pos: self.pos,
            cyclic_pos: self.cyclic_pos,
            cyclic_size: self.cyclic_size,
            history: self.history,
            len_limit,
            cut_value: self.cut_value,
        };
        self.index.get_matches(&ctx, out);

        if let Some(last) = out.last_mut() {
            if last.len as usize == self.nice_len && self.nice_len < self.match_max_len {
                let limit = self.match_max_len.min(self.available());
                let back = cur - last.dist as usize;
                let mut len = last.len as usize;
                while len < limit && data[cur + len] == data[back + len] {
                    len += 1;
                }
                last.len = len as u32;
            }
        }

        self.move_pos();
    }

    /// Advance `n` positions, still indexing each of them
    pub fn skip(&mut self, n: usize) {
        for _ in 0..n {
            let len_limit = self.nice_len.min(self.available());
            if len_limit >= MATCH_MIN_LEN {
                let (data, cur) = self.window.buffer();
                let ctx = SearchContext {
                    data,
                    cur,
                    pos: self.pos,
                    cyclic_pos: self.cyclic_pos,
                    cyclic_size: self.cyclic_size,
                    history: self.history,
                    len_limit,
                    cut_value: self.cut_value,
                };
                self.index.skip(&ctx);
            }
            self.move_pos();
        }
    }

    fn move_pos(&mut self) {
        self.window.advance(1);
        self.pos += 1;
        self.cyclic_pos += 1;
        if self.cyclic_pos == self.cyclic_size {
            self.cyclic_pos = 0;
        }
        if self.pos >= self.normalize_limit {
            let offset = self.pos - self.history - 1;
            self.index.normalize(offset);
            self.pos -= offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder(kind: MatchFinderKind, data: &[u8], nice: usize) -> MatchFinder {
        let window = InputWindow::new(1 << 15, 1 << 16, 1 << 16);
        let mut mf = MatchFinder::new(kind, Format::Deflate, nice, 32, window);
        assert_eq!(mf.fill(data), data.len());
        mf
    }

    fn all_matches(mf: &mut MatchFinder) -> Vec<Vec<Match>> {
        let mut result = Vec::new();
        let mut out = Vec::new();
        while mf.available() > 0 {
            mf.get_matches(&mut out);
            result.push(out.clone());
        }
        result
    }

    #[test]
    fn test_finds_repeat_at_distance() {
        for kind in [MatchFinderKind::HashChain, MatchFinderKind::BinaryTree] {
            // 20 unique bytes, a gap, then the first 12 repeated
            let mut data: Vec<u8> = (100..120).collect();
            data.extend_from_slice(b"xyz");
            data.extend(100..112u8);
            data.push(0);
            let mut mf = finder(kind, &data, 64);
            let matches = all_matches(&mut mf);
            assert_eq!(matches[23], vec![Match { len: 12, dist: 23 }], "{kind:?}");
            for (i, found) in matches.iter().enumerate().take(23) {
                assert!(found.is_empty(), "{kind:?} at {i}");
            }
        }
    }

    #[test]
    fn test_matches_increase_in_length() {
        for kind in [MatchFinderKind::HashChain, MatchFinderKind::BinaryTree] {
            let data = b"abcdXabcdeYabcdefZabcdefg".to_vec();
            let mut mf = finder(kind, &data, 64);
            let matches = all_matches(&mut mf);
            // At "abcdefg": abcdef at distance 7, abcde at 13, abcd at 18
            let at = &matches[18];
            assert_eq!(
                at,
                &vec![Match { len: 6, dist: 7 }],
                "{kind:?}: most recent candidate is already the longest"
            );
            for found in &matches {
                for pair in found.windows(2) {
                    assert!(pair[0].len < pair[1].len);
                }
            }
        }
    }

    #[test]
    fn test_never_reports_past_real_match() {
        for kind in [MatchFinderKind::HashChain, MatchFinderKind::BinaryTree] {
            let data = b"the quick brown fox; the quick brown cat".to_vec();
            let mut mf = finder(kind, &data, 258);
            let matches = all_matches(&mut mf);
            for (i, found) in matches.iter().enumerate() {
                for m in found {
                    let start = i - m.dist as usize;
                    let len = m.len as usize;
                    assert_eq!(data[start..start + len], data[i..i + len], "{kind:?} at {i}");
                }
            }
            assert_eq!(matches[21].last(), Some(&Match { len: 16, dist: 21 }));
        }
    }

    #[test]
    fn test_nice_length_match_is_extended() {
        for kind in [MatchFinderKind::HashChain, MatchFinderKind::BinaryTree] {
            let data = vec![7u8; 400];
            let mut mf = finder(kind, &data, 16);
            let mut out = Vec::new();
            mf.get_matches(&mut out);
            assert!(out.is_empty());
            mf.get_matches(&mut out);
            assert_eq!(out.last(), Some(&Match { len: 258, dist: 1 }), "{kind:?}");
        }
    }

    #[test]
    fn test_skip_still_indexes() {
        for kind in [MatchFinderKind::HashChain, MatchFinderKind::BinaryTree] {
            let data = b"0123456789-0123456789".to_vec();
            let mut mf = finder(kind, &data, 64);
            mf.skip(11);
            let mut out = Vec::new();
            mf.get_matches(&mut out);
            assert_eq!(out.last(), Some(&Match { len: 10, dist: 11 }), "{kind:?}");
        }
    }

    #[test]
    fn test_normalization_keeps_recent_positions() {
        for kind in [MatchFinderKind::HashChain, MatchFinderKind::BinaryTree] {
            let mut data: Vec<u8> = (0..40_000u32).map(|i| (i * 7 % 251) as u8).collect();
            data.extend_from_slice(b"needle-in-a-haystack");
            data.extend_from_slice(&[1, 2, 3]);
            data.extend_from_slice(b"needle-in-a-haystack");
            let window = InputWindow::new(1 << 15, 1 << 16, 1 << 16);
            let mut mf = MatchFinder::new(kind, Format::Deflate, 64, 32, window)
                .with_normalize_limit(40_010);
            assert_eq!(mf.fill(&data), data.len());
            mf.skip(40_023);
            assert!(mf.position() < 40_000);
            let mut out = Vec::new();
            mf.get_matches(&mut out);
            assert_eq!(out.last(), Some(&Match { len: 20, dist: 23 }), "{kind:?}");
        }
    }

    #[test]
    fn test_tail_shorter_than_min_match() {
        for kind in [MatchFinderKind::HashChain, MatchFinderKind::BinaryTree] {
            let mut mf = finder(kind, b"abab", 64);
            let matches = all_matches(&mut mf);
            assert_eq!(matches.len(), 4);
            assert!(matches.iter().all(|m| m.is_empty()));
        }
    }
}
