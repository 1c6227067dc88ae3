use super::{hash3, hash4, normalize_table, MatchSearch, SearchContext};
use crate::deflate::tokens::Match;

const HASH3_BITS: u32 = 16;
const HASH4_BITS: u32 = 16;

/// Hash-chain index
///
/// A 4-byte hash heads a chain of earlier positions linked through `chain`.
/// The most recent position with the same 3-byte hash is checked first so
/// that short close matches are not lost behind 4-byte collisions. There is
/// no 2-byte table: matches shorter than 3 bytes are never coded.
///
/// The 4-byte head is updated whenever 4 bytes are buffered, even when the
/// length limit is 3, so the chain stays complete for small `fb` settings.
pub struct HashChain {
    head3: Vec<u32>,
    head4: Vec<u32>,
    chain: Vec<u32>,
}

impl HashChain {
    pub fn new(cyclic_size: usize) -> Self {
        Self {
            head3: vec![0; 1 << HASH3_BITS],
            head4: vec![0; 1 << HASH4_BITS],
            chain: vec![0; cyclic_size],
        }
    }

    /// Insert the current position; returns the previous chain head, if any
    fn insert(&mut self, ctx: &SearchContext<'_>) -> (u32, u32) {
        let bytes = &ctx.data[ctx.cur..];
        let h3 = hash3(bytes, HASH3_BITS);
        let prev3 = std::mem::replace(&mut self.head3[h3], ctx.pos);

        let prev4 = if bytes.len() >= 4 {
            let h4 = hash4(bytes, HASH4_BITS);
            std::mem::replace(&mut self.head4[h4], ctx.pos)
        } else {
            0
        };
        self.chain[ctx.cyclic_pos] = prev4;
        (prev3, prev4)
    }
}

impl MatchSearch for HashChain {
    fn get_matches(&mut self, ctx: &SearchContext<'_>, out: &mut Vec<Match>) {
        let (prev3, prev4) = self.insert(ctx);
        let data = ctx.data;
        let cur = ctx.cur;
        let mut best = 2usize;

        if let Some(delta) = ctx.delta_to(prev3) {
            let back = cur - delta as usize;
            if data[back..back + 3] == data[cur..cur + 3] {
                best = ctx.common_len(delta, 3);
                out.push(Match { len: best as u32, dist: delta });
                if best == ctx.len_limit {
                    return;
                }
            }
        }

        let mut cur_match = prev4;
        let mut cycles = ctx.cut_value;
        while cycles > 0 {
            let Some(delta) = ctx.delta_to(cur_match) else {
                break;
            };
            cycles -= 1;
            let back = cur - delta as usize;
            if data[back + best] == data[cur + best] && data[back] == data[cur] {
                let len = ctx.common_len(delta, 0);
                if len > best {
                    best = len;
                    out.push(Match { len: len as u32, dist: delta });
                    if len == ctx.len_limit {
                        break;
                    }
                }
            }
            cur_match = self.chain[ctx.cyclic_index(delta)];
        }
    }

    fn skip(&mut self, ctx: &SearchContext<'_>) {
        self.insert(ctx);
    }

    fn normalize(&mut self, offset: u32) {
        normalize_table(&mut self.head3, offset);
        normalize_table(&mut self.head4, offset);
        normalize_table(&mut self.chain, offset);
    }
}
