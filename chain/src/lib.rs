//! Binary parsing of Bitcoin `blk*.dat` blocks and transactions.
//!
//! This crate implements components B and D of the iteration engine: the
//! little-endian/varint primitive parser and cursor, and the block header
//! and transaction decoders (including the segregated-witness
//! serialization variant and TXID/WTXID computation). It knows nothing
//! about the filesystem (component A lives in
//! `iterate_state::blockfiles`), the chain-assembly graph, or the UTXO
//! set -- those live in `iterate-state`.

pub mod block;
pub mod network;
pub mod reader;
pub mod serialization;
pub mod transaction;
pub mod transparent;
pub mod varint;

pub use serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
pub use varint::Varint;
