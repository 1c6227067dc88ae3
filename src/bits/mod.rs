pub mod reader;
pub mod writer;

pub use reader::BitReader;
pub use writer::BitWriter;

/// Reverse the bottom `n` bits of `value`
#[inline]
pub fn reverse_bits(value: u32, n: u8) -> u32 {
    if n == 0 {
        return 0;
    }
    value.reverse_bits() >> (32 - n as u32)
}
