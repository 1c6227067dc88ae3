#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be decoded or rejected with an error, never panic
    let plain = flate64::decompress(data);
    let _ = flate64::decompress64(data);

    // Whatever we accept as plain DEFLATE, zlib must agree on
    if let Ok(ours) = plain {
        use flate2::read::DeflateDecoder;
        use std::io::Read;

        let mut theirs = Vec::new();
        if DeflateDecoder::new(data).read_to_end(&mut theirs).is_ok() {
            assert_eq!(ours, theirs, "decoders disagree");
        }
    }
});
