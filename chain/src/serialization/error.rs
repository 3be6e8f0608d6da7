use std::io;

use thiserror::Error;

/// A serialization or parse error, produced while decoding a block or
/// transaction from its on-disk Bitcoin consensus encoding.
#[derive(Error, Debug)]
pub enum SerializationError {
    /// An io error that prevented deserialization (includes unexpected EOF,
    /// i.e. a block or transaction that runs past the bytes available).
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The data to be deserialized was structurally malformed.
    #[error("parse error: {0}")]
    Parse(&'static str),
}

impl SerializationError {
    pub fn eof() -> Self {
        SerializationError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "unexpected end of block data",
        ))
    }
}
