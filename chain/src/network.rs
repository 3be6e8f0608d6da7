//! Network selection: which magic marker precedes each block on disk, and
//! which genesis hash terminates the backward `prev_id` walk.

use crate::block::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet3,
}

impl Network {
    /// The 4-byte magic that precedes every block record in a `blk*.dat` file.
    pub fn marker(self) -> [u8; 4] {
        match self {
            Network::Mainnet => 0xD9B4_BEF9u32.to_le_bytes(),
            Network::Testnet3 => 0x0709_110Bu32.to_le_bytes(),
        }
    }

    /// The hash of the genesis block, used to recognize height 0.
    pub fn genesis_hash(self) -> Hash {
        match self {
            // bitcoin-cli getblockhash 0
            Network::Mainnet => {
                "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
            }
            // bitcoin-cli -testnet getblockhash 0
            Network::Testnet3 => {
                "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943"
            }
        }
        .parse()
        .expect("hard-coded genesis hash parses")
    }

    /// Default Bitcoin Core data directory name for this network, relative
    /// to `$HOME`.
    pub fn default_data_subdir(self) -> &'static str {
        match self {
            Network::Mainnet => ".bitcoin",
            Network::Testnet3 => ".bitcoin/testnet3",
        }
    }
}
