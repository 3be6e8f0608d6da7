//! Consensus-critical serialization.
//!
//! Two traits carry the wire format used by `blk*.dat`: `BitcoinSerialize`,
//! used only to feed a block header's fixed fields into a hasher in a
//! single well-defined byte order, and `BitcoinDeserialize`, used
//! pervasively by the block and transaction decoders in [`crate::block`]
//! and [`crate::transaction`].
//!
//! Multi-byte integers are little-endian on the wire; hashes are raw bytes
//! with no endianness swap (the swap only happens for human-readable
//! display, in [`crate::block::Hash`] and the transaction hash types).

mod deserialize;
mod error;

pub mod sha256d;

pub use deserialize::BitcoinDeserialize;
pub use error::SerializationError;

use byteorder::{LittleEndian, WriteBytesExt};

pub trait BitcoinSerialize {
    fn bitcoin_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error>;
}

impl BitcoinSerialize for u32 {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl BitcoinSerialize for u64 {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl BitcoinSerialize for [u8; 4] {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(self)
    }
}

impl BitcoinSerialize for [u8; 32] {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(self)
    }
}
