//! Component F: the UTXO set. A hash table of UTXO groups keyed by
//! funding TXID, with admission, release, and the crude two-output
//! payment/change classifier.

use std::collections::HashMap;

use iterate_chain::block::Hash;
use iterate_chain::transaction::Transaction;
use iterate_chain::transparent::Output;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Unknown = 0,
    Payment = 1,
    Change = 2,
}

/// One funding transaction's worth of outputs, tracked together to
/// minimize the number of small allocations a busy UTXO set needs.
#[derive(Debug, Clone)]
pub struct UtxoGroup {
    pub txid: [u8; 32],
    pub timestamp: u32,
    pub height: u32,
    pub txnum: u32,
    pub num_outputs: u32,
    /// Ref-count of outputs still unspent.
    pub unspent_outputs: u32,
    pub unspent: u64,
    pub spent: u64,
    pub amounts: Vec<u64>,
    pub output_types: Vec<u8>,
}

/// An output with a non-empty script whose first byte is `OP_RETURN`
/// (`0x6a`) can never be spent and is never admitted to the set.
pub fn is_unspendable(output: &Output) -> bool {
    output.is_unspendable()
}

/// Classifies a transaction's outputs. Only exactly-two-output
/// transactions are examined: if precisely one of the two amounts is a
/// multiple of 1000 satoshis, that one is guessed as the round payment
/// and the other as change; otherwise (including every other output
/// count) every output is `Unknown`.
pub fn classify_outputs(outputs: &[Output]) -> Vec<OutputType> {
    if outputs.len() == 2 {
        let round = [outputs[0].amount % 1000 == 0, outputs[1].amount % 1000 == 0];
        if round[0] != round[1] {
            return if round[0] {
                vec![OutputType::Payment, OutputType::Change]
            } else {
                vec![OutputType::Change, OutputType::Payment]
            };
        }
    }
    vec![OutputType::Unknown; outputs.len()]
}

#[derive(Default)]
pub struct UtxoSet {
    groups: HashMap<[u8; 32], UtxoGroup>,
}

impl UtxoSet {
    pub fn new() -> UtxoSet {
        UtxoSet::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, txid: &[u8; 32]) -> Option<&UtxoGroup> {
        self.groups.get(txid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UtxoGroup> {
        self.groups.values()
    }

    /// Inserts an already-built group directly, bypassing admission.
    /// Used only by the UTXO cache reader, which reconstructs groups
    /// from a prior run rather than deriving them from a transaction.
    pub fn insert_group(&mut self, group: UtxoGroup) {
        self.groups.insert(group.txid, group);
    }

    /// Admits `tx`'s outputs. If none of them are spendable, nothing is
    /// inserted (the transaction never enters the set at all).
    pub fn admit(&mut self, tx: &Transaction, height: u32, timestamp: u32, txnum: u32) {
        let types = classify_outputs(&tx.outputs);
        let mut amounts = Vec::with_capacity(tx.outputs.len());
        let mut unspent_outputs = 0u32;
        let mut unspent = 0u64;
        let mut spent = 0u64;

        for output in &tx.outputs {
            amounts.push(output.amount);
            if is_unspendable(output) {
                spent += output.amount;
            } else {
                unspent += output.amount;
                unspent_outputs += 1;
            }
        }

        if unspent_outputs == 0 {
            return;
        }

        self.groups.insert(
            tx.txid,
            UtxoGroup {
                txid: tx.txid,
                timestamp,
                height,
                txnum,
                num_outputs: tx.outputs.len() as u32,
                unspent_outputs,
                unspent,
                spent,
                amounts,
                output_types: types.into_iter().map(|t| t as u8).collect(),
            },
        );
    }

    /// Releases the output `(prev_txid, prev_index)`, as spent by some
    /// later input. Fatal if the referenced UTXO doesn't exist -- the
    /// core never guesses at missing inputs (§7).
    pub fn release(&mut self, prev_txid: [u8; 32], prev_index: u32) -> Result<(), Error> {
        let group = self.groups.get_mut(&prev_txid).ok_or(Error::UnknownUtxo {
            prev_txid: Hash::from_bytes(prev_txid),
            prev_index,
        })?;
        let amount = *group.amounts.get(prev_index as usize).ok_or(Error::UnknownUtxo {
            prev_txid: Hash::from_bytes(prev_txid),
            prev_index,
        })?;

        group.spent += amount;
        group.unspent -= amount;
        group.unspent_outputs -= 1;

        if group.unspent_outputs == 0 {
            self.groups.remove(&prev_txid);
        }
        Ok(())
    }
}
