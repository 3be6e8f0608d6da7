//! Component B: a cursor for pulling primitives out of an in-memory block
//! of bytes (the block file itself is handed in already mapped or
//! buffered by `iterate_state::blockfiles::OpenFileCache`).

use std::io;

use crate::{BitcoinDeserialize, SerializationError, Varint};

/// A cursor over an in-memory byte slice with an advancing offset, used to
/// decode a block header or transaction once its bytes are in hand.
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// The raw bytes consumed so far, i.e. `bytes[start..self.pos())`.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.bytes[start..self.pos]
    }

    pub fn pull_bytes(&mut self, n: usize) -> Result<&'a [u8], SerializationError> {
        if self.remaining() < n {
            return Err(SerializationError::eof());
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn pull_u32_le(&mut self) -> Result<u32, SerializationError> {
        u32::bitcoin_deserialize(&mut *self)
    }

    pub fn pull_u64_le(&mut self) -> Result<u64, SerializationError> {
        u64::bitcoin_deserialize(&mut *self)
    }

    pub fn pull_hash(&mut self) -> Result<[u8; 32], SerializationError> {
        <[u8; 32]>::bitcoin_deserialize(&mut *self)
    }

    pub fn pull_varint(&mut self) -> Result<u64, SerializationError> {
        Ok(Varint::bitcoin_deserialize(&mut *self)?.value())
    }
}

impl<'a> io::Read for Cursor<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = std::cmp::min(buf.len(), self.remaining());
        buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
