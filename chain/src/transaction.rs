//! Transactions: legacy and segregated-witness decoding, with dual
//! TXID/WTXID computation.

use serde::{Deserialize, Serialize};

use crate::reader::Cursor;
use crate::serialization::sha256d;
use crate::transparent;
use crate::SerializationError;

/// A decoded transaction. `txid` is always the double-SHA256 of the
/// original (pre-segwit) serialization; `wtxid` additionally covers the
/// witness data when `is_segwit`, and otherwise equals `txid`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<transparent::Input>,
    pub outputs: Vec<transparent::Output>,
    pub lock_time: u32,
    pub is_segwit: bool,
    pub txid: [u8; 32],
    pub wtxid: [u8; 32],
    pub total_len: u64,
    pub non_segwit_len: u64,
}

/// Feeds the bytes consumed since `*context_offset` into `digest` and
/// `*non_segwit_len`, then advances `*context_offset` to the cursor's
/// current position. Shared by every step of [`Transaction::decode`] that
/// appends to the original-serialization digest.
fn absorb(
    cursor: &Cursor<'_>,
    digest: &mut sha256d::Writer,
    non_segwit_len: &mut u64,
    context_offset: &mut usize,
) {
    use std::io::Write;
    let consumed = cursor.consumed_since(*context_offset);
    digest
        .write_all(consumed)
        .expect("writing to a Sha256 writer is infallible");
    *non_segwit_len += consumed.len() as u64;
    *context_offset = cursor.pos();
}

impl Transaction {
    /// Virtual length: `ceil((3 * non_segwit_len + total_len) / 4)`.
    /// Equal to `total_len` for non-segwit transactions.
    pub fn virtual_len(&self) -> u64 {
        (3 * self.non_segwit_len + self.total_len + 3) / 4
    }

    /// Weight: `3 * non_segwit_len + total_len`.
    pub fn weight(&self) -> u64 {
        3 * self.non_segwit_len + self.total_len
    }

    /// Decodes one transaction starting at the cursor's current
    /// position, leaving the cursor positioned just past it.
    ///
    /// This is the one place TXID/WTXID are computed, following the
    /// original-serialization digest exactly: the marker+flag bytes (if
    /// segwit) and the witness data are fed into `non_segwit_len` and the
    /// TXID digest only by their *absence* -- each `context_offset` reset
    /// below is a point where bytes already consumed are deliberately
    /// excluded from both.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Transaction, SerializationError> {
        let start = cursor.pos();
        let mut digest = sha256d::Writer::default();
        let mut context_offset = start;
        let mut non_segwit_len: u64 = 0;

        let version = cursor.pull_u32_le()?;
        absorb(cursor, &mut digest, &mut non_segwit_len, &mut context_offset);

        let first = cursor.pull_varint()?;
        let is_segwit;
        let input_count;
        if first == 0 {
            let flag = cursor.pull_varint()?;
            if flag != 1 {
                return Err(SerializationError::Parse("invalid segwit flag byte"));
            }
            is_segwit = true;
            // Discards the marker and flag from the digest and from
            // non_segwit_len.
            context_offset = cursor.pos();
            input_count = cursor.pull_varint()?;
        } else {
            is_segwit = false;
            input_count = first;
        }

        let mut inputs = Vec::with_capacity(input_count.min(4096) as usize);
        for _ in 0..input_count {
            let prev_txid = cursor.pull_hash()?;
            let prev_index = cursor.pull_u32_le()?;
            let script = transparent::script::read(cursor)?;
            let sequence = cursor.pull_u32_le()?;
            inputs.push(transparent::Input {
                prev_txid,
                prev_index,
                script,
                witness: None,
                sequence,
            });
        }

        let output_count = cursor.pull_varint()?;
        let mut outputs = Vec::with_capacity(output_count.min(4096) as usize);
        for _ in 0..output_count {
            let amount = cursor.pull_u64_le()?;
            let script = transparent::script::read(cursor)?;
            outputs.push(transparent::Output { amount, script });
        }

        absorb(cursor, &mut digest, &mut non_segwit_len, &mut context_offset);

        if is_segwit {
            for input in inputs.iter_mut() {
                let stack_count = cursor.pull_varint()?;
                let mut stack = Vec::with_capacity(stack_count.min(4096) as usize);
                for _ in 0..stack_count {
                    let item_len = cursor.pull_varint()?;
                    stack.push(cursor.pull_bytes(item_len as usize)?.to_vec());
                }
                input.witness = Some(stack);
            }
            // Discards the witness data from the digest and from
            // non_segwit_len.
            context_offset = cursor.pos();
        }

        let lock_time = cursor.pull_u32_le()?;
        absorb(cursor, &mut digest, &mut non_segwit_len, &mut context_offset);

        let total_len = (cursor.pos() - start) as u64;
        let txid = digest.finish();

        let wtxid = if is_segwit {
            sha256d::double_sha256(cursor.consumed_since(start))
        } else {
            txid
        };

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            is_segwit,
            txid,
            wtxid,
            total_len,
            non_segwit_len,
        })
    }
}
