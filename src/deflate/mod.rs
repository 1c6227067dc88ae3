//! DEFLATE (RFC 1951) and Deflate64 block coding
//!
//! [`block`] and [`optimal`] choose and write blocks, [`encoder`] and
//! [`decoder`] wrap them into `Write` / `Read` streams.

pub mod block;
pub mod decoder;
pub mod encoder;
pub mod optimal;
pub mod tables;
pub mod tokens;

pub use decoder::{Decoder, Inflater};
pub use encoder::Encoder;
pub use tables::Format;
pub use tokens::{Match, Token};
