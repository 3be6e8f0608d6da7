//! Transaction inputs and outputs.

pub mod script;

use serde::{Deserialize, Serialize};

/// A transaction input.
///
/// Coinbase inputs carry the conventional all-zero `prev_txid` and
/// `prev_index == u32::MAX`, but whether a given input *is* the coinbase
/// is really a property of its position (transaction 0, input 0 of a
/// block) rather than of these bytes; that check lives with whatever
/// code already knows the transaction's index in the block.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub prev_txid: [u8; 32],
    pub prev_index: u32,
    pub script: Vec<u8>,
    /// Witness stack items, one `Vec<u8>` per item. `None` for inputs of
    /// non-segwit transactions; `Some` (possibly empty) for every input
    /// of a segwit transaction.
    pub witness: Option<Vec<Vec<u8>>>,
    pub sequence: u32,
}

/// A transaction output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub amount: u64,
    pub script: Vec<u8>,
}

impl Output {
    /// An `OP_RETURN` output can never be spent, so it never enters the
    /// UTXO set.
    pub fn is_unspendable(&self) -> bool {
        self.script.first() == Some(&0x6a)
    }
}
