//! Component G: the two-tier on-disk cache. A block-index cache (fixed
//! per-block records keyed to the last block file's mtime) and a
//! per-start-block UTXO snapshot cache.
//!
//! Layout is whatever `bincode` produces for these structs on the host
//! build; §4.G's note that mismatched builds reading old caches is an
//! accepted operational risk applies here as much as to a hand-rolled
//! byte layout.

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use iterate_chain::block::{Hash, Header};

use crate::chain::ChainIndex;
use crate::utxo::UtxoSet;

#[derive(Serialize, Deserialize)]
struct CachedBlock {
    id: Hash,
    header: Header,
    file_index: u32,
    tx_count: u64,
    first_tx_offset: u64,
}

fn block_cache_path(cache_dir: &Path, last_block_file: &Path) -> PathBuf {
    cache_dir.join(last_block_file.file_name().expect("block file has a name"))
}

/// `true` iff a readable block-index cache exists and is newer than
/// `last_block_file`'s own mtime.
pub fn block_cache_is_valid(cache_dir: &Path, last_block_file: &Path) -> bool {
    let cache_path = block_cache_path(cache_dir, last_block_file);
    let cache_mtime = match fs::metadata(&cache_path).and_then(|m| m.modified()) {
        Ok(mtime) => mtime,
        Err(_) => return false,
    };
    let source_mtime = match fs::metadata(last_block_file).and_then(|m| m.modified()) {
        Ok(mtime) => mtime,
        Err(_) => return false,
    };
    cache_mtime > source_mtime
}

/// Reads the block-index cache and replays it through `ChainIndex`'s
/// normal insertion path, so height resolution and duplicate handling
/// behave identically to a cold scan.
pub fn read_block_cache(cache_dir: &Path, last_block_file: &Path) -> io::Result<ChainIndex> {
    let path = block_cache_path(cache_dir, last_block_file);
    let file = fs::File::open(&path)?;
    let mut reader = io::BufReader::new(file);
    let mut index = ChainIndex::new();

    loop {
        match bincode::deserialize_from::<_, CachedBlock>(&mut reader) {
            Ok(record) => {
                index.insert(
                    record.id,
                    record.header,
                    record.file_index,
                    record.tx_count,
                    record.first_tx_offset,
                );
            }
            Err(err) => match *err {
                bincode::ErrorKind::Io(io_err)
                    if io_err.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                _ => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
            },
        }
    }
    Ok(index)
}

/// Writes every block currently in `index` as a flat concatenation of
/// fixed-layout records. Called only at the end of a full, unconstrained
/// scan (a partial `block_end` run would write a truncated index).
pub fn write_block_cache(
    cache_dir: &Path,
    last_block_file: &Path,
    blocks: impl Iterator<Item = (Hash, Header, u32, u64, u64)>,
) -> io::Result<()> {
    fs::create_dir_all(cache_dir)?;
    let path = block_cache_path(cache_dir, last_block_file);
    let file = fs::File::create(&path)?;
    let mut writer = io::BufWriter::new(file);

    for (id, header, file_index, tx_count, first_tx_offset) in blocks {
        let record = CachedBlock { id, header, file_index, tx_count, first_tx_offset };
        bincode::serialize_into(&mut writer, &record)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    }
    Ok(())
}

/// Hash's own `Display` already reverses to the conventional lowercase-hex
/// order, which is exactly the 64-character filename §4.G specifies.
fn utxo_cache_path(cache_dir: &Path, start_block: Hash) -> PathBuf {
    cache_dir.join(start_block.to_string())
}

#[derive(Serialize, Deserialize)]
struct CachedUtxoGroup {
    txid: [u8; 32],
    timestamp: u32,
    height: u32,
    txnum: u32,
    num_outputs: u32,
    unspent_outputs: u32,
    unspent: u64,
    spent: u64,
    amounts: Vec<u64>,
    output_types: Vec<u8>,
}

/// Reads the UTXO snapshot cache for `start_block`, if one exists. A
/// record that runs past the remaining bytes means the file was
/// truncated (e.g. by a killed writer); in that case the file is deleted
/// and `Ok(None)` is returned rather than guessing at a partial set.
pub fn read_utxo_cache(cache_dir: &Path, start_block: Hash) -> io::Result<Option<UtxoSet>> {
    let path = utxo_cache_path(cache_dir, start_block);
    let file = match fs::File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let mut reader = io::BufReader::new(file);
    let mut set = UtxoSet::new();

    loop {
        // A clean end-of-file (no bytes left at all) means every record up
        // to here was whole. Any deserialize failure once bytes remain --
        // including the EOF a partial record triggers -- means the file
        // was cut off mid-record, which this can't tell apart from a
        // genuinely malformed one; either way it's unusable.
        if reader.fill_buf()?.is_empty() {
            break;
        }
        match bincode::deserialize_from::<_, CachedUtxoGroup>(&mut reader) {
            Ok(record) => {
                set.insert_group(crate::utxo::UtxoGroup {
                    txid: record.txid,
                    timestamp: record.timestamp,
                    height: record.height,
                    txnum: record.txnum,
                    num_outputs: record.num_outputs,
                    unspent_outputs: record.unspent_outputs,
                    unspent: record.unspent,
                    spent: record.spent,
                    amounts: record.amounts,
                    output_types: record.output_types,
                });
            }
            Err(_) => {
                drop(reader);
                let _ = fs::remove_file(&path);
                return Ok(None);
            }
        }
    }
    Ok(Some(set))
}

pub fn write_utxo_cache(cache_dir: &Path, start_block: Hash, set: &UtxoSet) -> io::Result<()> {
    fs::create_dir_all(cache_dir)?;
    let path = utxo_cache_path(cache_dir, start_block);
    let file = fs::File::create(&path)?;
    let mut writer = io::BufWriter::new(file);

    for group in set.iter() {
        let record = CachedUtxoGroup {
            txid: group.txid,
            timestamp: group.timestamp,
            height: group.height,
            txnum: group.txnum,
            num_outputs: group.num_outputs,
            unspent_outputs: group.unspent_outputs,
            unspent: group.unspent,
            spent: group.spent,
            amounts: group.amounts.clone(),
            output_types: group.output_types.clone(),
        };
        bincode::serialize_into(&mut writer, &record)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::thread::sleep;
    use std::time::Duration;

    use super::*;
    use crate::utxo::UtxoGroup;

    fn header(prev_id: Hash, nonce: u32) -> Header {
        Header { version: 1, prev_id, merkle_root: [0; 32], timestamp: 0, difficulty_target: 0, nonce }
    }

    fn id(byte: u8) -> Hash {
        Hash::from_bytes([byte; 32])
    }

    fn block_dir_and_cache_dir(dir: &tempdir::TempDir) -> (PathBuf, PathBuf) {
        let blocks = dir.path().join("blocks");
        let cache = dir.path().join("cache");
        fs::create_dir_all(&blocks).unwrap();
        (blocks, cache)
    }

    #[test]
    fn block_cache_round_trips_through_normal_insertion() {
        let dir = tempdir::TempDir::new("iterate-state-test").unwrap();
        let (blocks, cache) = block_dir_and_cache_dir(&dir);
        let last_block_file = blocks.join("blk00001.dat");
        fs::write(&last_block_file, b"source").unwrap();
        sleep(Duration::from_millis(1100));

        write_block_cache(
            &cache,
            &last_block_file,
            vec![
                (id(1), header(Hash::genesis_parent(), 1), 0, 1, 0),
                (id(2), header(id(1), 2), 0, 1, 100),
            ]
            .into_iter(),
        )
        .unwrap();

        assert!(block_cache_is_valid(&cache, &last_block_file));
        let index = read_block_cache(&cache, &last_block_file).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&id(1)).unwrap().height, Some(0));
        assert_eq!(index.get(&id(2)).unwrap().height, Some(1));
    }

    #[test]
    fn block_cache_is_invalid_once_source_is_touched_again() {
        let dir = tempdir::TempDir::new("iterate-state-test").unwrap();
        let (blocks, cache) = block_dir_and_cache_dir(&dir);
        let last_block_file = blocks.join("blk00001.dat");
        fs::write(&last_block_file, b"source").unwrap();
        sleep(Duration::from_millis(1100));
        write_block_cache(&cache, &last_block_file, std::iter::empty()).unwrap();
        assert!(block_cache_is_valid(&cache, &last_block_file));

        sleep(Duration::from_millis(1100));
        fs::write(&last_block_file, b"source, rewritten").unwrap();
        assert!(!block_cache_is_valid(&cache, &last_block_file));
    }

    fn group(txid: [u8; 32], amounts: Vec<u64>) -> UtxoGroup {
        UtxoGroup {
            txid,
            timestamp: 1_600_000_000,
            height: 42,
            txnum: 3,
            num_outputs: amounts.len() as u32,
            unspent_outputs: amounts.len() as u32,
            unspent: amounts.iter().sum(),
            spent: 0,
            output_types: vec![0; amounts.len()],
            amounts,
        }
    }

    #[test]
    fn utxo_cache_round_trips() {
        let dir = tempdir::TempDir::new("iterate-state-test").unwrap();
        let start = id(9);
        let mut set = UtxoSet::new();
        set.insert_group(group([1; 32], vec![1000, 2000]));
        set.insert_group(group([2; 32], vec![500]));

        write_utxo_cache(dir.path(), start, &set).unwrap();
        let restored = read_utxo_cache(dir.path(), start).unwrap().unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(&[1; 32]).unwrap().amounts, vec![1000, 2000]);
    }

    #[test]
    fn truncated_utxo_cache_is_deleted_and_invalidated() {
        let dir = tempdir::TempDir::new("iterate-state-test").unwrap();
        let start = id(9);
        let mut set = UtxoSet::new();
        set.insert_group(group([1; 32], vec![1000, 2000]));
        write_utxo_cache(dir.path(), start, &set).unwrap();

        let path = utxo_cache_path(dir.path(), start);
        let full = fs::read(&path).unwrap();
        let mut file = fs::OpenOptions::new().write(true).truncate(true).open(&path).unwrap();
        file.write_all(&full[..full.len() / 2]).unwrap();
        drop(file);

        assert!(read_utxo_cache(dir.path(), start).unwrap().is_none());
        assert!(!path.exists());
    }
}
