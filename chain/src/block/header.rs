use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::serialization::sha256d;
use crate::SerializationError;

use super::Hash;

/// An 80-byte Bitcoin block header: `version | prev_id | merkle_root |
/// timestamp | difficulty_target | nonce`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub struct Header {
    pub version: u32,
    pub prev_id: Hash,
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub difficulty_target: u32,
    pub nonce: u32,
}

impl Header {
    pub const LEN: usize = 80;

    /// Decodes the 80-byte header and computes its block id in the same
    /// pass, hashing the raw bytes directly rather than reserializing --
    /// this is the only place a block id is ever computed, so there is no
    /// benefit to routing it back through a generic serializer.
    pub fn decode(bytes: &[u8]) -> Result<(Header, Hash), SerializationError> {
        if bytes.len() < Self::LEN {
            return Err(SerializationError::Parse("short block header"));
        }
        let header_bytes = &bytes[..Self::LEN];

        let mut hash_writer = sha256d::Writer::default();
        hash_writer
            .write_all(header_bytes)
            .expect("writing to a Sha256 writer is infallible");
        let id = Hash(hash_writer.finish());

        let mut cursor = crate::reader::Cursor::new(header_bytes);
        let header = Header {
            version: cursor.pull_u32_le()?,
            prev_id: Hash(cursor.pull_hash()?),
            merkle_root: cursor.pull_hash()?,
            timestamp: cursor.pull_u32_le()?,
            difficulty_target: cursor.pull_u32_le()?,
            nonce: cursor.pull_u32_le()?,
        };
        Ok((header, id))
    }
}
