//! Component C: enumerate `blk*.dat` files in a blocks directory, keep a
//! small LRU of open (possibly memory-mapped) files, and scan past
//! padding to find the next block record.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use regex::Regex;

use iterate_chain::network::Network;

use crate::Error;

/// Size of the open-file LRU (component C specifies exactly two slots:
/// the file currently being scanned and the one most recently evicted
/// from it, to absorb the common back-and-forth pattern of height
/// chasing across a file boundary).
const LRU_CAPACITY: usize = 2;

/// One `blk<number>.dat` file discovered in the blocks directory.
#[derive(Debug, Clone)]
pub struct BlockFile {
    pub index: u32,
    pub path: PathBuf,
}

/// The sparse index of discovered block files, keyed by their numeric
/// suffix.
#[derive(Debug, Default)]
pub struct BlockFileIndex {
    files: HashMap<u32, BlockFile>,
}

impl BlockFileIndex {
    /// Enumerates `blk<number>.dat` in `dir`. A duplicate numeric suffix
    /// (which should never happen on a real Bitcoin Core data directory)
    /// is a fatal error rather than a silently-dropped file.
    pub fn discover(dir: &Path) -> Result<BlockFileIndex, Error> {
        let pattern = Regex::new(r"^blk(\d+)\.dat$").expect("valid regex");
        let mut files = HashMap::new();

        let entries = std::fs::read_dir(dir).map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| Error::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(name) => name,
                None => continue,
            };
            let captures = match pattern.captures(name) {
                Some(captures) => captures,
                None => continue,
            };
            let index: u32 = captures[1].parse().expect("regex guarantees digits");
            let path = entry.path();
            if files.insert(index, BlockFile { index, path }).is_some() {
                return Err(Error::DuplicateBlockFile { index, dir: dir.to_path_buf() });
            }
        }
        Ok(BlockFileIndex { files })
    }

    pub fn get(&self, index: u32) -> Option<&BlockFile> {
        self.files.get(&index)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The highest file number present, if any.
    pub fn max_index(&self) -> Option<u32> {
        self.files.keys().copied().max()
    }

    /// Visits file indices in ascending order.
    pub fn indices_ascending(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.files.keys().copied().collect();
        indices.sort_unstable();
        indices
    }
}

/// Resolves the default search path for a network's blocks directory:
/// `$HOME/.bitcoin[/testnet3]/blocks`, falling back to the same directory
/// without the `blocks` suffix for older/legacy layouts.
pub fn default_block_dirs(network: Network) -> Vec<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let base = home.join(network.default_data_subdir());
    vec![base.join("blocks"), base]
}

enum OpenFile {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl OpenFile {
    fn bytes(&self) -> &[u8] {
        match self {
            OpenFile::Mapped(map) => &map[..],
            OpenFile::Buffered(buf) => &buf[..],
        }
    }

    fn open(path: &Path, use_mmap: bool) -> io::Result<OpenFile> {
        let file = File::open(path)?;
        if use_mmap {
            // Safety: the backing file is not expected to be mutated
            // concurrently by another process while we iterate it; this
            // mirrors every other read-only mmap block explorer.
            let map = unsafe { Mmap::map(&file)? };
            Ok(OpenFile::Mapped(map))
        } else {
            use std::io::Read;
            let mut buf = Vec::new();
            let mut file = file;
            file.read_to_end(&mut buf)?;
            Ok(OpenFile::Buffered(buf))
        }
    }
}

struct LruSlot {
    index: u32,
    file: OpenFile,
}

/// A 2-slot LRU of open block files, with the chunk-discard bookkeeping
/// (§4.C) folded in: every ~128 MiB of forward progress through the
/// currently mapped file, `madvise(MADV_DONTNEED)` is hinted over the
/// region already passed.
pub struct OpenFileCache {
    use_mmap: bool,
    slots: VecDeque<LruSlot>,
    discard_points: HashMap<u32, usize>,
}

const CHUNK_DISCARD_BYTES: usize = 128 * 1024 * 1024;

impl OpenFileCache {
    pub fn new(use_mmap: bool) -> OpenFileCache {
        OpenFileCache {
            use_mmap,
            slots: VecDeque::with_capacity(LRU_CAPACITY),
            discard_points: HashMap::new(),
        }
    }

    /// Returns the bytes of `file`, opening it (and evicting the LRU tail
    /// if necessary) on a cache miss.
    pub fn get(&mut self, file: &BlockFile) -> Result<&[u8], Error> {
        if let Some(pos) = self.slots.iter().position(|slot| slot.index == file.index) {
            let slot = self.slots.remove(pos).expect("position just found");
            self.slots.push_front(slot);
        } else {
            if self.slots.len() >= LRU_CAPACITY {
                let evicted = self.slots.pop_back();
                if let Some(evicted) = evicted {
                    self.discard_points.remove(&evicted.index);
                }
            }
            let opened = OpenFile::open(&file.path, self.use_mmap).map_err(|source| Error::Io {
                path: file.path.clone(),
                source,
            })?;
            self.slots.push_front(LruSlot { index: file.index, file: opened });
        }
        Ok(self.slots[0].file.bytes())
    }

    /// Advises the OS that bytes before `offset` in `file` are no longer
    /// needed, if more than [`CHUNK_DISCARD_BYTES`] has passed since the
    /// last discard point. Pure optimization: failure is ignored.
    pub fn maybe_discard(&mut self, file_index: u32, offset: usize) {
        let last = self.discard_points.entry(file_index).or_insert(0);
        if offset.saturating_sub(*last) >= CHUNK_DISCARD_BYTES {
            if let Some(slot) = self.slots.iter().find(|slot| slot.index == file_index) {
                if let OpenFile::Mapped(map) = &slot.file {
                    #[cfg(unix)]
                    let _ = map.advise_range(
                        memmap2::Advice::DontNeed,
                        0,
                        offset.min(map.len()),
                    );
                }
            }
            *last = offset;
        }
    }
}

/// Scans forward from `start` in `bytes` for the four-byte network
/// marker. Returns the offset it was found at, plus the amount of
/// padding skipped. Returns `None` at end-of-file.
pub fn scan_for_marker(bytes: &[u8], start: usize, marker: [u8; 4]) -> Option<(usize, usize)> {
    if start >= bytes.len() {
        return None;
    }
    let mut offset = start;
    while offset + 4 <= bytes.len() {
        if bytes[offset..offset + 4] == marker {
            return Some((offset, offset - start));
        }
        offset += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const MARKER: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

    #[test]
    fn discover_finds_numbered_block_files() {
        let dir = tempdir::TempDir::new("iterate-state-test").unwrap();
        fs::write(dir.path().join("blk00000.dat"), b"").unwrap();
        fs::write(dir.path().join("blk00017.dat"), b"").unwrap();
        fs::write(dir.path().join("notablockfile.txt"), b"").unwrap();

        let index = BlockFileIndex::discover(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.indices_ascending(), vec![0, 17]);
        assert_eq!(index.max_index(), Some(17));
    }

    #[test]
    fn scan_for_marker_reports_padding_skipped() {
        let mut bytes = vec![0u8; 6];
        bytes.extend_from_slice(&MARKER);
        let (offset, padding) = scan_for_marker(&bytes, 0, MARKER).unwrap();
        assert_eq!(offset, 6);
        assert_eq!(padding, 6);
    }

    #[test]
    fn scan_for_marker_returns_none_past_end_of_file() {
        let bytes = vec![0u8; 3];
        assert!(scan_for_marker(&bytes, 0, MARKER).is_none());
    }

    #[test]
    fn open_file_cache_evicts_the_lru_tail_at_two_slots() {
        let dir = tempdir::TempDir::new("iterate-state-test").unwrap();
        let make = |index: u32| {
            let path = dir.path().join(format!("blk{:05}.dat", index));
            fs::write(&path, [index as u8; 16]).unwrap();
            BlockFile { index, path }
        };
        let a = make(0);
        let b = make(1);
        let c = make(2);

        let mut cache = OpenFileCache::new(false);
        assert_eq!(cache.get(&a).unwrap()[0], 0);
        assert_eq!(cache.get(&b).unwrap()[0], 1);
        // Evicts `a`; reopening it afterward must not error.
        assert_eq!(cache.get(&c).unwrap()[0], 2);
        assert_eq!(cache.get(&a).unwrap()[0], 0);
    }
}
