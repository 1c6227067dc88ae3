pub mod bits;
pub mod config;
pub mod deflate;
pub mod error;
pub mod huffman;
pub mod matchfinder;
pub mod window;

pub use config::{
    Algorithm, BlockTuning, CompressionLevel, DecoderConfig, EncoderConfig, MatchFinderKind,
};
pub use deflate::{Decoder, Encoder, Format};
pub use error::{Error, Result};

use std::io::{self, Read, Write};

/// Observer of stream progress
///
/// Called with the uncompressed and compressed byte counts after every block
/// (encoder) or decoding round (decoder). Errors returned by the observer are
/// ignored.
pub trait Progress {
    fn report(&mut self, in_bytes: u64, out_bytes: u64) -> io::Result<()>;
}

impl<F> Progress for F
where
    F: FnMut(u64, u64) -> io::Result<()>,
{
    fn report(&mut self, in_bytes: u64, out_bytes: u64) -> io::Result<()> {
        self(in_bytes, out_bytes)
    }
}

/// Compress `data` into a complete DEFLATE (or Deflate64) stream
pub fn compress(data: &[u8], config: &EncoderConfig) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(Vec::with_capacity(data.len() / 2 + 64), config)?;
    encoder.write_data(data)?;
    encoder.finish()
}

/// Decompress a complete DEFLATE stream
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with(data, &DecoderConfig::default())
}

/// Decompress a complete Deflate64 stream
pub fn decompress64(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with(data, &DecoderConfig { deflate64: true, ..Default::default() })
}

fn decompress_with(data: &[u8], config: &DecoderConfig) -> Result<Vec<u8>> {
    let mut decoder = Decoder::new(data, config);
    let mut out = Vec::with_capacity(data.len() * 3);
    let mut buf = vec![0u8; 1 << 16];
    loop {
        match decoder.read_data(&mut buf)? {
            0 => return Ok(out),
            n => out.extend_from_slice(&buf[..n]),
        }
    }
}

/// Copy everything from `input` through a new encoder into `output`;
/// returns the number of uncompressed bytes read
pub fn compress_stream<R: Read, W: Write>(
    mut input: R,
    output: W,
    config: &EncoderConfig,
) -> Result<u64> {
    let mut encoder = Encoder::new(output, config)?;
    let mut buf = vec![0u8; 1 << 16];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        encoder.write_data(&buf[..n])?;
    }
    let total = encoder.total_in();
    encoder.finish()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let data = b"ABABABABAB".repeat(50);
        for level in 0..=9 {
            let config = EncoderConfig::new(CompressionLevel::from_level(level));
            let compressed = compress(&data, &config).unwrap();
            assert_eq!(decompress(&compressed).unwrap(), data, "level {level}");
        }
    }

    #[test]
    fn test_deflate64_roundtrip() {
        let data = vec![b'7'; 200_000];
        let config = EncoderConfig { deflate64: true, ..EncoderConfig::default() };
        let compressed = compress(&data, &config).unwrap();
        assert_eq!(decompress64(&compressed).unwrap(), data);
    }

    #[test]
    fn test_compress_stream_counts_input() {
        let data = b"stream me".repeat(1000);
        let mut out = Vec::new();
        let n = compress_stream(&data[..], &mut out, &EncoderConfig::default()).unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(decompress(&out).unwrap(), data);
    }
}
