//! Command-line argument parsing. Stands in for spec.md's out-of-scope
//! flag parser; maps 1:1 onto `iterate_state::Config`.

use std::path::PathBuf;

use structopt::StructOpt;

use iterate_chain::block::Hash;
use iterate_chain::network::Network;
use iterate_state::Config;

#[derive(StructOpt, Debug)]
#[structopt(name = "bitcoin-iterate", about = "Walk a Bitcoin blk*.dat directory and print blocks, transactions and UTXO snapshots.")]
pub struct Opt {
    /// Directory containing blk*.dat (default: the platform's standard
    /// Bitcoin data directory).
    #[structopt(long)]
    pub block_dir: Option<PathBuf>,

    /// Directory for the block-index and UTXO caches. Omit to disable
    /// caching entirely.
    #[structopt(long)]
    pub cache_dir: Option<PathBuf>,

    /// Use testnet3's network marker and genesis block instead of mainnet's.
    #[structopt(long)]
    pub testnet: bool,

    /// Inclusive lower bound on height.
    #[structopt(long)]
    pub block_start: Option<u32>,

    /// Inclusive lower bound by block hash.
    #[structopt(long)]
    pub start_hash: Option<Hash>,

    /// Inclusive upper bound on height.
    #[structopt(long)]
    pub block_end: Option<u32>,

    /// Inclusive upper bound by block hash; also pins the chain tip used
    /// for longest-chain resolution.
    #[structopt(long)]
    pub end_hash: Option<Hash>,

    /// Emit a UTXO-set snapshot every N blocks walked.
    #[structopt(long, default_value = "144")]
    pub utxo_period: u32,

    /// Disable memory-mapped reads in favor of buffered I/O.
    #[structopt(long)]
    pub no_mmap: bool,

    /// Suppress progress output on standard error.
    #[structopt(short, long)]
    pub quiet: bool,

    /// Emit this many progress dots spread across the walk.
    #[structopt(short, long, default_value = "0")]
    pub progress_marks: u32,

    /// Print one line per block.
    #[structopt(long)]
    pub print_blocks: bool,

    /// Print one line per transaction.
    #[structopt(long)]
    pub print_transactions: bool,

    /// Print one line per input.
    #[structopt(long)]
    pub print_inputs: bool,

    /// Print one line per output.
    #[structopt(long)]
    pub print_outputs: bool,

    /// Print a summary line every time a UTXO snapshot is taken.
    #[structopt(long)]
    pub print_utxo: bool,
}

impl Opt {
    pub fn network(&self) -> Network {
        if self.testnet {
            Network::Testnet3
        } else {
            Network::Mainnet
        }
    }

    /// Whether any registered print flag needs transaction-level decoding.
    /// `print_blocks` alone doesn't -- a block summary only needs the
    /// header, which the chain index already has without re-reading the
    /// file (spec.md §4.D's "88 bytes per block" fast path).
    pub fn needs_transactions(&self) -> bool {
        self.print_transactions || self.print_inputs || self.print_outputs
    }

    pub fn needs_utxo(&self) -> bool {
        self.print_utxo || self.print_inputs
    }

    pub fn to_config(&self) -> Config {
        let mut config = Config::new(self.network());
        config.block_dir = self.block_dir.clone();
        config.cache_dir = self.cache_dir.clone();
        config.block_start = self.block_start;
        config.start_hash = self.start_hash;
        config.block_end = self.block_end;
        config.end_hash = self.end_hash;
        config.utxo_period = self.utxo_period;
        config.use_mmap = !self.no_mmap;
        config.needs_utxo = self.needs_utxo();
        config.quiet = self.quiet;
        config.progress_marks = self.progress_marks;
        config
    }
}
