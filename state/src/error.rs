use std::path::PathBuf;

use iterate_chain::block::Hash;
use thiserror::Error;

/// Every error this crate can raise is fatal to the walk (§7): there is no
/// recovery path for a malformed block file or a broken invariant, only a
/// descriptive message and a non-zero exit.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("block directory has two files claiming index {index}: {dir}")]
    DuplicateBlockFile { index: u32, dir: PathBuf },

    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: iterate_chain::SerializationError,
    },

    #[error("unknown block hash {0}")]
    UnknownHash(Hash),

    #[error("{0}'s ancestry never reaches a block with a resolved height")]
    UnresolvedAncestor(Hash),

    #[error("genesis block never appeared in any block file")]
    MissingGenesis,

    #[error("input ({prev_txid}, {prev_index}) spends a UTXO not present in the set")]
    UnknownUtxo { prev_txid: Hash, prev_index: u32 },
}
