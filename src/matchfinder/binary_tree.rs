use super::{hash3, normalize_table, MatchSearch, SearchContext};
use crate::deflate::tokens::Match;

const HASH_BITS: u32 = 16;

/// Binary-tree index
///
/// Each 3-byte hash bucket roots a binary search tree of earlier positions
/// ordered by the bytes that follow them. Every position owns two son slots
/// (smaller, larger). Inserting the current position re-roots the tree at it
/// while walking down, and the common prefix already known on each side
/// (`len0` / `len1`) lets whole subtrees be skipped without comparing.
pub struct BinaryTree {
    head: Vec<u32>,
    son: Vec<u32>,
}

impl BinaryTree {
    pub fn new(cyclic_size: usize) -> Self {
        Self { head: vec![0; 1 << HASH_BITS], son: vec![0; cyclic_size * 2] }
    }

    /// Walk the tree from the bucket head, re-linking it under the current
    /// position; reports improving matches to `out` when given
    fn walk(&mut self, ctx: &SearchContext<'_>, mut out: Option<&mut Vec<Match>>) {
        let data = ctx.data;
        let cur = ctx.cur;
        let h = hash3(&data[cur..], HASH_BITS);
        let mut cur_match = std::mem::replace(&mut self.head[h], ctx.pos);

        // Slots still waiting for the next smaller / larger subtree
        let mut ptr0 = ctx.cyclic_pos * 2 + 1;
        let mut ptr1 = ctx.cyclic_pos * 2;
        let (mut len0, mut len1) = (0usize, 0usize);
        let mut max_len = 2usize;
        let mut cycles = ctx.cut_value;

        loop {
            let delta = match ctx.delta_to(cur_match) {
                Some(delta) if cycles > 0 => delta,
                _ => {
                    self.son[ptr0] = 0;
                    self.son[ptr1] = 0;
                    return;
                }
            };
            cycles -= 1;

            let pair = ctx.cyclic_index(delta) * 2;
            let back = cur - delta as usize;
            let mut len = len0.min(len1);
            if data[back + len] == data[cur + len] {
                len = ctx.common_len(delta, len + 1);
                if let Some(out) = out.as_deref_mut() {
                    if len > max_len {
                        max_len = len;
                        out.push(Match { len: len as u32, dist: delta });
                    }
                }
                if len == ctx.len_limit {
                    self.son[ptr1] = self.son[pair];
                    self.son[ptr0] = self.son[pair + 1];
                    return;
                }
            }

            if data[back + len] < data[cur + len] {
                self.son[ptr1] = cur_match;
                ptr1 = pair + 1;
                cur_match = self.son[ptr1];
                len1 = len;
            } else {
                self.son[ptr0] = cur_match;
                ptr0 = pair;
                cur_match = self.son[ptr0];
                len0 = len;
            }
        }
    }
}

impl MatchSearch for BinaryTree {
    fn get_matches(&mut self, ctx: &SearchContext<'_>, out: &mut Vec<Match>) {
        self.walk(ctx, Some(out));
    }

    fn skip(&mut self, ctx: &SearchContext<'_>) {
        self.walk(ctx, None);
    }

    fn normalize(&mut self, offset: u32) {
        normalize_table(&mut self.head, offset);
        normalize_table(&mut self.son, offset);
    }
}
