use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // DEFLATE stream errors
    #[error("Invalid DEFLATE block type: {0}")]
    InvalidBlockType(u8),

    #[error("Invalid Huffman code length: {0} (max 15)")]
    InvalidCodeLength(u8),

    #[error("Huffman code oversubscribed: more codes than possible for bit length")]
    HuffmanOversubscribed,

    #[error("Bitstream does not match any Huffman code")]
    InvalidHuffmanCode,

    #[error("Invalid code length symbol: {0}")]
    InvalidCodeLengthSymbol(u16),

    #[error("Code length repeat with no previous length")]
    RepeatWithoutPrevious,

    #[error("Code length run ends at {end}, table holds {available} entries")]
    CodeLengthOverflow { end: usize, available: usize },

    #[error("Too many distance codes: {0}")]
    TooManyDistanceCodes(usize),

    #[error("Invalid length code: {0}")]
    InvalidLengthCode(u16),

    #[error("Invalid distance code: {0}")]
    InvalidDistanceCode(u16),

    #[error("Back-reference distance {distance} exceeds available window {available}")]
    InvalidBackReference { distance: u32, available: u64 },

    #[error("Stored block length mismatch: LEN={len}, NLEN={nlen}")]
    StoredBlockLengthMismatch { len: u16, nlen: u16 },

    #[error("Size mismatch: expected {expected} bytes, got {found}")]
    SizeMismatch { expected: u64, found: u64 },

    #[error("Unexpected end of input")]
    UnexpectedEof,

    // Construction errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stream has been closed")]
    Disposed,
}

impl Error {
    /// Whether the error describes a malformed bitstream
    pub fn is_data_error(&self) -> bool {
        !matches!(
            self,
            Error::Io(_) | Error::UnexpectedEof | Error::InvalidArgument(_) | Error::Disposed
        )
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::UnexpectedEof => std::io::Error::new(ErrorKind::UnexpectedEof, err),
            Error::InvalidArgument(_) => std::io::Error::new(ErrorKind::InvalidInput, err),
            Error::Disposed => std::io::Error::new(ErrorKind::Other, err),
            _ => std::io::Error::new(ErrorKind::InvalidData, err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_kinds() {
        assert!(Error::InvalidBlockType(3).is_data_error());
        assert!(Error::SizeMismatch { expected: 1, found: 0 }.is_data_error());
        assert!(!Error::UnexpectedEof.is_data_error());
        assert!(!Error::Disposed.is_data_error());
    }

    #[test]
    fn test_io_conversion_keeps_kind() {
        let io: std::io::Error = Error::UnexpectedEof.into();
        assert_eq!(io.kind(), std::io::ErrorKind::UnexpectedEof);

        let io: std::io::Error = Error::HuffmanOversubscribed.into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
        let inner = io.into_inner().unwrap().downcast::<Error>().unwrap();
        assert!(matches!(*inner, Error::HuffmanOversubscribed));
    }
}
