//! Driver configuration (§6).

use std::path::PathBuf;

use iterate_chain::block::Hash;
use iterate_chain::network::Network;

/// Every knob the driver reads before starting a walk. Construct with
/// [`Config::new`] and override fields directly; there's no builder,
/// matching how small this surface is.
#[derive(Debug, Clone)]
pub struct Config {
    pub network: Network,
    /// Directory containing `blk*.dat`. `None` means "use the platform's
    /// standard Bitcoin data directory for `network`".
    pub block_dir: Option<PathBuf>,
    /// Directory for the block-index and UTXO caches. `None` disables
    /// caching entirely.
    pub cache_dir: Option<PathBuf>,
    pub block_start: Option<u32>,
    pub start_hash: Option<Hash>,
    pub block_end: Option<u32>,
    pub end_hash: Option<Hash>,
    /// Emit a UTXO-set snapshot every N blocks iterated.
    pub utxo_period: u32,
    pub use_mmap: bool,
    /// Caller-declared: the registered callbacks need the UTXO set
    /// maintained (§6 explicitly keeps this a plain boolean input rather
    /// than deriving it from a format string).
    pub needs_utxo: bool,
    pub quiet: bool,
    /// Emit this many progress dots spread across the walk; 0 disables.
    pub progress_marks: u32,
}

impl Config {
    pub fn new(network: Network) -> Config {
        Config {
            network,
            block_dir: None,
            cache_dir: None,
            block_start: None,
            start_hash: None,
            block_end: None,
            end_hash: None,
            utxo_period: 144,
            use_mmap: true,
            needs_utxo: false,
            quiet: false,
            progress_marks: 0,
        }
    }
}
