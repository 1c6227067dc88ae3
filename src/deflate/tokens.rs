/// A single LZ77 token chosen by the parser
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    /// A literal byte
    Literal(u8),
    /// A back-reference: copy `length` bytes from `distance` bytes back
    Match { length: u32, distance: u32 },
}

/// A match candidate reported by the match finder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub len: u32,
    /// One-based distance
    pub dist: u32,
}
