#![no_main]

use flate64::{compress, decompress, decompress64, CompressionLevel, EncoderConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: &[u8]| {
    // First byte picks level and format, the rest is the payload
    let Some((&selector, data)) = input.split_first() else {
        return;
    };
    let level = selector % 10;
    let deflate64 = selector & 0x80 != 0;

    let config =
        EncoderConfig { deflate64, ..EncoderConfig::new(CompressionLevel::from_level(level)) };
    let compressed = compress(data, &config).expect("compression failed");
    let decoded = if deflate64 { decompress64(&compressed) } else { decompress(&compressed) };
    assert_eq!(decoded.expect("decompression failed"), data, "round-trip mismatch");

    if !deflate64 {
        use flate2::read::DeflateDecoder;
        use std::io::Read;

        let mut theirs = Vec::new();
        DeflateDecoder::new(&compressed[..]).read_to_end(&mut theirs).expect("zlib rejected");
        assert_eq!(theirs, data);
    }
});
