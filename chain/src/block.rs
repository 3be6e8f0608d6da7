//! Block headers and the on-disk block record framing.

mod hash;
mod header;

use std::convert::TryInto;
use std::sync::Arc;

pub use hash::Hash;
pub use header::Header;

use crate::reader::Cursor;
use crate::transaction::Transaction;
use crate::SerializationError;

/// The bytes of one `blk*.dat` record, parsed far enough to know the
/// header, the block id, the transaction count and where the
/// transactions and the next record start.
///
/// This mirrors spec §4.D's "header decode, then skip": `next_offset` is
/// computed from `payload_length`, not by actually parsing the
/// transactions, so a caller that doesn't need transaction-level data can
/// walk an entire file touching only 88 bytes per block.
pub struct RecordStart {
    pub header: Header,
    pub id: Hash,
    pub tx_count: u64,
    /// Offset, relative to the start of this record's network marker, of
    /// the first transaction.
    pub first_tx_offset: u64,
    /// Offset, relative to the start of this record's network marker, of
    /// the next record.
    pub next_record_offset: u64,
}

impl RecordStart {
    /// Decodes `{ marker:u32_le, payload_length:u32_le, header[80],
    /// varint tx_count }` from the start of `bytes`. Does not verify that
    /// `marker` matches the expected network marker; callers already know
    /// they're positioned at a marker because the file walker (component
    /// C) found one.
    pub fn decode(bytes: &[u8]) -> Result<RecordStart, SerializationError> {
        if bytes.len() < 8 + Header::LEN {
            return Err(SerializationError::eof());
        }
        let payload_length = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as u64;
        let (header, id) = Header::decode(&bytes[8..])?;

        let mut cursor = Cursor::new(&bytes[8 + Header::LEN..]);
        let tx_count = cursor.pull_varint()?;
        let first_tx_offset = 8 + Header::LEN as u64 + cursor.pos() as u64;

        Ok(RecordStart {
            header,
            id,
            tx_count,
            first_tx_offset,
            next_record_offset: 8 + payload_length,
        })
    }
}

/// A fully decoded block: header plus every transaction. Produced on
/// demand by the driver (component H) when a caller has asked for
/// transaction-, input- or output-level data; never retained block over
/// block (spec §5's per-block scratch arena contract).
#[derive(Debug)]
pub struct Block {
    pub header: Header,
    pub id: Hash,
    pub transactions: Vec<Arc<Transaction>>,
}

impl Block {
    /// Decodes `tx_count` consecutive transactions starting at `bytes`.
    pub fn decode_transactions(
        bytes: &[u8],
        tx_count: u64,
    ) -> Result<Vec<Arc<Transaction>>, SerializationError> {
        let mut cursor = Cursor::new(bytes);
        let mut transactions = Vec::with_capacity(tx_count.min(4096) as usize);
        for _ in 0..tx_count {
            transactions.push(Arc::new(Transaction::decode(&mut cursor)?));
        }
        Ok(transactions)
    }
}
