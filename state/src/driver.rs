//! Component H: the callback-driven driver. Ties file discovery (C),
//! chain assembly (E), the UTXO set (F) and the cache (G) into the single
//! synchronous walk described in §5 and §6: discover files, assemble or
//! restore the chain index, linearize it, then walk `[start, end]` in
//! ascending height order firing callbacks as it goes.

use std::path::PathBuf;

use iterate_chain::block::{Block, Hash, RecordStart};
use iterate_chain::network::Network;
use iterate_chain::transaction::Transaction;
use iterate_chain::transparent::{Input, Output};

use crate::blockfiles::{self, BlockFileIndex, OpenFileCache};
use crate::cache;
use crate::chain::{BlockEntry, ChainIndex};
use crate::config::Config;
use crate::error::Error;
use crate::utxo::UtxoSet;

/// Read-only view of the walk's current position, handed to every
/// callback. Borrowed, not owned: nothing here outlives a single
/// callback invocation (§5's per-block scratch arena contract).
pub struct WalkState<'a> {
    pub utxos: &'a UtxoSet,
    pub block: &'a BlockEntry,
    pub height: u32,
}

/// Every hook the driver can call, each with a no-op default so a caller
/// implements only what it needs (§6's five optional emit callbacks).
pub trait Callbacks {
    fn on_block(&mut self, _state: &WalkState<'_>) {}
    fn on_transaction(&mut self, _state: &WalkState<'_>, _tx: &Transaction, _txnum: u32) {}
    fn on_input(&mut self, _state: &WalkState<'_>, _input: &Input) {}
    fn on_output(&mut self, _state: &WalkState<'_>, _output: &Output, _index: u32) {}
    fn on_utxo(&mut self, _utxos: &UtxoSet, _block: &BlockEntry) {}

    /// Whether this callback set needs transaction-level decoding at all.
    /// `false` lets the driver skip re-reading and decoding a block's
    /// transactions, touching only the 88-or-so header bytes per block.
    fn needs_transactions(&self) -> bool {
        true
    }

    /// Whether a UTXO-set snapshot should be emitted every `utxo_period`
    /// blocks, independent of whether `on_utxo` is registered at all.
    fn needs_utxo_emission(&self) -> bool {
        false
    }
}

fn resolve_block_dir(config: &Config) -> Result<PathBuf, Error> {
    if let Some(dir) = &config.block_dir {
        return Ok(dir.clone());
    }
    for candidate in blockfiles::default_block_dirs(config.network) {
        if candidate.is_dir() {
            return Ok(candidate);
        }
    }
    Err(Error::Io {
        path: PathBuf::from("$HOME"),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no default blocks directory exists for this network",
        ),
    })
}

/// Cold-scans every block file in `indices`, decoding only each record's
/// header and transaction count. Stops scanning a fork once it runs more
/// than 100 blocks past `block_end` -- later blocks there can't affect
/// the requested range (§4.E's early-termination heuristic).
fn scan_all_files(
    files: &BlockFileIndex,
    indices: &[u32],
    open_files: &mut OpenFileCache,
    network: Network,
    block_end: Option<u32>,
) -> Result<ChainIndex, Error> {
    let marker = network.marker();
    let stop_above = block_end.map(|h| h + 100);
    let mut index = ChainIndex::new();

    'files: for &file_index in indices {
        let file = files.get(file_index).expect("index came from this file list");
        let mut offset = 0usize;

        loop {
            let bytes = open_files.get(file)?;
            let (marker_offset, _padding) = match blockfiles::scan_for_marker(bytes, offset, marker)
            {
                Some(found) => found,
                None => continue 'files,
            };
            let record = match RecordStart::decode(&bytes[marker_offset..]) {
                Ok(record) => record,
                Err(_) => continue 'files,
            };

            let id = record.id;
            let next_offset = marker_offset + record.next_record_offset as usize;
            index.insert(
                id,
                record.header,
                file_index,
                record.tx_count,
                marker_offset as u64 + record.first_tx_offset,
            );

            if let Some(stop) = stop_above {
                if index.get(&id).and_then(|entry| entry.height) > Some(stop) {
                    break 'files;
                }
            }

            if next_offset <= marker_offset {
                continue 'files;
            }
            offset = next_offset;
            open_files.maybe_discard(file_index, offset);
        }
    }
    Ok(index)
}

fn assemble_chain_index(
    files: &BlockFileIndex,
    indices: &[u32],
    open_files: &mut OpenFileCache,
    config: &Config,
) -> Result<ChainIndex, Error> {
    let last_file = &files.get(*indices.last().expect("checked non-empty")).expect("present").path;

    if let Some(cache_dir) = &config.cache_dir {
        if cache::block_cache_is_valid(cache_dir, last_file) {
            tracing::info!(cache_dir = %cache_dir.display(), "restoring block index from cache");
            return cache::read_block_cache(cache_dir, last_file).map_err(|source| Error::Io {
                path: last_file.clone(),
                source,
            });
        }
    }

    tracing::info!(files = indices.len(), "cold-scanning block files");
    let index = scan_all_files(files, indices, open_files, config.network, config.block_end)?;

    // A cache built from a constrained scan would be missing blocks a
    // later, unconstrained run expects to find; only persist it when this
    // scan covered every block file end to end.
    if let Some(cache_dir) = &config.cache_dir {
        if config.block_end.is_none() && config.end_hash.is_none() {
            let records = index
                .iter()
                .map(|entry| (entry.id, entry.header.clone(), entry.file_index, entry.tx_count, entry.first_tx_offset));
            if let Err(err) = cache::write_block_cache(cache_dir, last_file, records) {
                tracing::warn!(error = %err, "failed to write block index cache");
            }
        }
    }

    Ok(index)
}

/// Returns the set to start the walk with, plus whether it came from the
/// cache. A freshly-computed (empty) set still needs to be checkpointed
/// once the walk reaches `start`; a restored one does not (§4.H step 4).
fn initial_utxo_set(config: &Config, order: &[Hash]) -> (UtxoSet, bool) {
    if !config.needs_utxo {
        return (UtxoSet::new(), false);
    }
    if let (Some(cache_dir), Some(first)) = (&config.cache_dir, order.first()) {
        if let Ok(Some(set)) = cache::read_utxo_cache(cache_dir, *first) {
            tracing::info!(start = %first, "restored UTXO set from cache");
            return (set, true);
        }
    }
    (UtxoSet::new(), false)
}

/// Runs the walk described by `config`, firing `callbacks` in ascending
/// height order. A block whose height falls on a `utxo_period` boundary
/// triggers a UTXO-set snapshot, both to `callbacks.on_utxo` (if the
/// caller asked for it) and to the on-disk cache (if one is configured).
/// The start block is checkpointed unconditionally the first time a run
/// computes it from scratch, independent of `utxo_period` and of whether
/// `on_utxo` is registered at all, so later runs over a later range never
/// have to replay the prefix again.
pub fn run(config: &Config, callbacks: &mut dyn Callbacks) -> Result<(), Error> {
    let block_dir = resolve_block_dir(config)?;
    let files = BlockFileIndex::discover(&block_dir)?;
    if files.is_empty() {
        tracing::warn!(dir = %block_dir.display(), "no blk*.dat files found");
        return Ok(());
    }
    let indices = files.indices_ascending();

    let mut open_files = OpenFileCache::new(config.use_mmap);
    let mut chain_index = assemble_chain_index(&files, &indices, &mut open_files, config)?;

    let order = chain_index.linearize(
        config.end_hash,
        config.block_start,
        config.start_hash,
        config.block_end,
    )?;

    let (mut utxos, utxo_restored) = initial_utxo_set(config, &order);
    let decode_transactions = callbacks.needs_transactions();
    let emit_utxo = config.needs_utxo && callbacks.needs_utxo_emission();

    let progress_every =
        if config.progress_marks > 0 { (order.len() / config.progress_marks as usize).max(1) } else { 0 };

    for (position, id) in order.iter().enumerate() {
        let entry = chain_index.get(id).ok_or(Error::UnknownHash(*id))?.clone();
        let height = entry.height.expect("every block in a linearized order has a height");

        let file = files.get(entry.file_index).expect("block's file_index came from this file list");
        let bytes = open_files.get(file)?;

        // At the start block, checkpoint a freshly-computed UTXO set so a
        // later run over a later range can restore it without replaying
        // the prefix again; a restored set is already checkpointed.
        if position == 0 && config.needs_utxo && !utxo_restored {
            if let Some(cache_dir) = &config.cache_dir {
                if let Err(err) = cache::write_utxo_cache(cache_dir, *id, &utxos) {
                    tracing::warn!(error = %err, block = %id, "failed to write UTXO cache");
                }
            }
        }

        let state = WalkState { utxos: &utxos, block: &entry, height };
        callbacks.on_block(&state);

        if decode_transactions || config.needs_utxo {
            let start = entry.first_tx_offset as usize;
            let transactions = Block::decode_transactions(&bytes[start..], entry.tx_count)
                .map_err(|source| Error::Parse { path: file.path.clone(), source })?;

            for (txnum, tx) in transactions.iter().enumerate() {
                // The transaction at index 0 is the coinbase: it spends
                // nothing, regardless of what bytes its input carries.
                if config.needs_utxo && txnum != 0 {
                    for input in &tx.inputs {
                        utxos.release(input.prev_txid, input.prev_index)?;
                    }
                }

                let state = WalkState { utxos: &utxos, block: &entry, height };
                callbacks.on_transaction(&state, tx, txnum as u32);
                for input in &tx.inputs {
                    callbacks.on_input(&state, input);
                }
                for (index, output) in tx.outputs.iter().enumerate() {
                    callbacks.on_output(&state, output, index as u32);
                }

                if config.needs_utxo {
                    utxos.admit(tx, height, entry.header.timestamp, txnum as u32);
                }
            }
        }

        if emit_utxo && config.utxo_period > 0 && height % config.utxo_period == 0 {
            callbacks.on_utxo(&utxos, &entry);
            if let Some(cache_dir) = &config.cache_dir {
                if let Err(err) = cache::write_utxo_cache(cache_dir, *id, &utxos) {
                    tracing::warn!(error = %err, block = %id, "failed to write UTXO cache");
                }
            }
        }

        if !config.quiet && progress_every > 0 && position % progress_every == 0 {
            tracing::info!(height, position, total = order.len(), "walking");
        }

        open_files.maybe_discard(entry.file_index, (entry.first_tx_offset as usize).max(1));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use iterate_chain::serialization::sha256d;

    use super::*;

    const MARKER: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

    /// Hand-encodes a minimal legacy transaction: single-byte input and
    /// output counts, zero-length input scripts, a fixed two-byte output
    /// script.
    fn tx_bytes(inputs: &[([u8; 32], u32)], outputs: &[u64]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(inputs.len() as u8);
        for (prev_txid, prev_index) in inputs {
            bytes.extend_from_slice(prev_txid);
            bytes.extend_from_slice(&prev_index.to_le_bytes());
            bytes.push(0x00);
            bytes.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        }
        bytes.push(outputs.len() as u8);
        for amount in outputs {
            bytes.extend_from_slice(&amount.to_le_bytes());
            bytes.push(0x02);
            bytes.extend_from_slice(&[0x76, 0xa9]);
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes
    }

    /// Hand-encodes one `blk*.dat` record: marker, payload length, the
    /// 80-byte header, and `txs.len()` transactions.
    fn block_record(prev_id: [u8; 32], txs: &[Vec<u8>]) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&1u32.to_le_bytes()); // version
        header.extend_from_slice(&prev_id);
        header.extend_from_slice(&[0; 32]); // merkle_root
        header.extend_from_slice(&0u32.to_le_bytes()); // timestamp
        header.extend_from_slice(&0u32.to_le_bytes()); // difficulty_target
        header.extend_from_slice(&0u32.to_le_bytes()); // nonce
        assert_eq!(header.len(), 80);

        let mut payload = header.clone();
        payload.push(txs.len() as u8);
        for tx in txs {
            payload.extend_from_slice(tx);
        }

        let mut record = Vec::new();
        record.extend_from_slice(&MARKER);
        record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        record.extend_from_slice(&payload);
        record
    }

    fn header_id(prev_id: [u8; 32]) -> [u8; 32] {
        let mut header = Vec::new();
        header.extend_from_slice(&1u32.to_le_bytes());
        header.extend_from_slice(&prev_id);
        header.extend_from_slice(&[0; 32]);
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        sha256d::double_sha256(&header)
    }

    /// Records the exact sequence of callback calls instead of doing
    /// anything with them, so the test can assert on ordering directly.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Callbacks for Recorder {
        fn on_block(&mut self, state: &WalkState<'_>) {
            self.events.push(format!("block:{}", state.height));
        }
        fn on_transaction(&mut self, state: &WalkState<'_>, _tx: &Transaction, txnum: u32) {
            self.events.push(format!("tx:{}:{}", state.height, txnum));
        }
        fn on_input(&mut self, state: &WalkState<'_>, _input: &Input) {
            self.events.push(format!("input:{}", state.height));
        }
        fn on_output(&mut self, state: &WalkState<'_>, _output: &Output, index: u32) {
            self.events.push(format!("output:{}:{}", state.height, index));
        }

        fn needs_transactions(&self) -> bool {
            true
        }

        // Deliberately false: the start-block checkpoint must happen
        // regardless of whether a caller wants periodic UTXO emission.
        fn needs_utxo_emission(&self) -> bool {
            false
        }
    }

    #[test]
    fn block_and_transaction_callbacks_fire_in_order_and_checkpoint_is_unconditional() {
        let dir = tempdir::TempDir::new("iterate-state-test").unwrap();
        let block_dir = dir.path().join("blocks");
        let cache_dir = dir.path().join("cache");
        fs::create_dir_all(&block_dir).unwrap();

        // Block 0's coinbase input deliberately carries non-sentinel bytes:
        // this only passes if the driver skips it by transaction position
        // (txnum == 0), not by matching the conventional all-zero/u32::MAX
        // sentinel.
        let coinbase0 = tx_bytes(&[([9; 32], 7)], &[5_000_000_000]);
        let coinbase0_txid = sha256d::double_sha256(&coinbase0);
        let block0 = block_record([0; 32], &[coinbase0.clone()]);
        let block0_id = header_id([0; 32]);

        let coinbase1 = tx_bytes(&[([0; 32], 0xFFFF_FFFF)], &[2_500_000_000]);
        let spend1 = tx_bytes(&[(coinbase0_txid, 0)], &[4_999_000_000]);
        let block1 = block_record(block0_id, &[coinbase1, spend1]);

        let mut file_bytes = block0;
        file_bytes.extend_from_slice(&block1);
        fs::write(block_dir.join("blk00000.dat"), &file_bytes).unwrap();

        let mut config = Config::new(Network::Mainnet);
        config.block_dir = Some(block_dir);
        config.cache_dir = Some(cache_dir.clone());
        config.needs_utxo = true;
        config.use_mmap = false;

        let mut recorder = Recorder::default();
        run(&config, &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            vec![
                "block:0".to_string(),
                "tx:0:0".to_string(),
                "input:0".to_string(),
                "output:0:0".to_string(),
                "block:1".to_string(),
                "tx:1:0".to_string(),
                "input:1".to_string(),
                "output:1:0".to_string(),
                "tx:1:1".to_string(),
                "input:1".to_string(),
                "output:1:0".to_string(),
            ]
        );

        // The start block's UTXO set is checkpointed unconditionally, even
        // though `Recorder::needs_utxo_emission` is false.
        let checkpoint = cache_dir.join(Hash::from_bytes(block0_id).to_string());
        assert!(checkpoint.exists());
    }
}
