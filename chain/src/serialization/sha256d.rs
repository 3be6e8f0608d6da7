//! Bitcoin's double-SHA256, exposed as an incremental `io::Write` sink.
//!
//! Block ids and TXIDs are both "hash the bytes, then hash the digest
//! again". Exposing it as a `Write` impl lets callers feed it either a
//! `BitcoinSerialize`d struct (block headers) or raw byte windows pulled
//! straight out of the block file (transactions, where the original
//! serialization must be hashed incrementally around the segwit
//! marker/flag and witness data -- see [`crate::transaction::serialize`]).

use sha2::{Digest, Sha256};
use std::io;

#[derive(Default)]
pub struct Writer(Sha256);

impl Writer {
    pub fn finish(self) -> [u8; 32] {
        let first = self.0.finalize();
        let second = Sha256::digest(&first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        out
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One-shot double-SHA256 of a byte slice.
pub fn double_sha256(bytes: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(bytes);
    let second = Sha256::digest(&first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}
