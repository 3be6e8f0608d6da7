//! A small fixed-field printer standing in for spec.md's out-of-scope
//! `%bh`/`%tF`/`%uC`-style format-string interpreter. Each entity kind
//! prints one line of a handful of representative fields, gated on the
//! corresponding `--print-*` flag.

use iterate_chain::transaction::Transaction;
use iterate_chain::transparent::{Input, Output};
use iterate_state::chain::BlockEntry;
use iterate_state::utxo::UtxoSet;
use iterate_state::{Callbacks, WalkState};

use crate::args::Opt;

pub struct Printer {
    pub print_blocks: bool,
    pub print_transactions: bool,
    pub print_inputs: bool,
    pub print_outputs: bool,
    pub print_utxo: bool,
    needs_transactions: bool,
}

impl Printer {
    pub fn new(opt: &Opt) -> Printer {
        Printer {
            print_blocks: opt.print_blocks,
            print_transactions: opt.print_transactions,
            print_inputs: opt.print_inputs,
            print_outputs: opt.print_outputs,
            print_utxo: opt.print_utxo,
            needs_transactions: opt.needs_transactions(),
        }
    }
}

impl Callbacks for Printer {
    fn on_block(&mut self, state: &WalkState<'_>) {
        if self.print_blocks {
            println!(
                "block {} height={} time={} txs={}",
                state.block.id, state.height, state.block.header.timestamp, state.block.tx_count,
            );
        }
    }

    fn on_transaction(&mut self, state: &WalkState<'_>, tx: &Transaction, txnum: u32) {
        if self.print_transactions {
            println!(
                "tx {} block={} txnum={} segwit={} vsize={}",
                Hex(&tx.txid),
                state.block.id,
                txnum,
                tx.is_segwit,
                tx.virtual_len(),
            );
        }
    }

    fn on_input(&mut self, _state: &WalkState<'_>, input: &Input) {
        if self.print_inputs {
            println!("input {}:{}", Hex(&input.prev_txid), input.prev_index);
        }
    }

    fn on_output(&mut self, _state: &WalkState<'_>, output: &Output, index: u32) {
        if self.print_outputs {
            println!("output {} amount={}", index, output.amount);
        }
    }

    fn on_utxo(&mut self, utxos: &UtxoSet, block: &BlockEntry) {
        if self.print_utxo {
            println!("utxo snapshot at {} groups={}", block.id, utxos.len());
        }
    }

    fn needs_transactions(&self) -> bool {
        self.needs_transactions
    }

    fn needs_utxo_emission(&self) -> bool {
        self.print_utxo
    }
}

/// Lowercase hex, not reversed -- TXIDs are conventionally displayed the
/// same way `bitcoin-cli` shows them, which for `[u8; 32]` without a
/// dedicated `Hash` wrapper means printing as-is would be byte-order
/// reversed from convention; reverse here to match.
struct Hex<'a>(&'a [u8; 32]);

impl std::fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut reversed = *self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}
