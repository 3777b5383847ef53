use serde::Deserialize;
use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use super::network::Network;
use crate::models::blockchain::block_height::BlockHeight;

/// Heights at or above this value are interpreted as timestamps by
/// `nExpiryHeight`, so expiry heights are capped just below it.
pub const TX_EXPIRY_HEIGHT_THRESHOLD: u32 = 500_000_000;

/// Number of blocks after the target height at which a built transaction
/// expires.
pub const DEFAULT_TX_EXPIRY_DELTA: u32 = 20;

/// Network upgrades that change which pools and transaction formats the
/// builder may use, in activation order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    strum_macros::Display,
    Serialize,
    Deserialize,
)]
pub enum NetworkUpgrade {
    Sprout,
    Overwinter,
    Sapling,
    #[strum(to_string = "NU5")]
    Nu5,
}

impl NetworkUpgrade {
    /// Consensus branch id committed to by signature hashes created while
    /// this upgrade is the most recent active one.
    pub const fn branch_id(&self) -> u32 {
        match self {
            NetworkUpgrade::Sprout => 0,
            NetworkUpgrade::Overwinter => 0x5ba8_1b19,
            NetworkUpgrade::Sapling => 0x76b8_09bb,
            NetworkUpgrade::Nu5 => 0xc2d6_d0b4,
        }
    }
}

/// Network upgrade schedule of one network.
///
/// Use [`ConsensusParams::for_network`] for the published schedules and
/// [`ConsensusParams::regtest_with`] when a test needs to place the builder
/// before or after a particular upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub network: Network,
    pub overwinter_activation: Option<BlockHeight>,
    pub sapling_activation: Option<BlockHeight>,
    pub nu5_activation: Option<BlockHeight>,
    pub tx_expiry_delta: u32,
}

impl ConsensusParams {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => Self {
                network,
                overwinter_activation: Some(BlockHeight::new(227_520)),
                sapling_activation: Some(BlockHeight::new(227_520)),
                // not scheduled
                nu5_activation: None,
                tx_expiry_delta: DEFAULT_TX_EXPIRY_DELTA,
            },
            Network::Testnet => Self {
                network,
                overwinter_activation: Some(BlockHeight::new(1)),
                sapling_activation: Some(BlockHeight::new(1)),
                nu5_activation: None,
                tx_expiry_delta: DEFAULT_TX_EXPIRY_DELTA,
            },
            Network::RegTest => Self::regtest_with(Some(1), Some(1), Some(1)),
        }
    }

    /// Regtest parameters with caller-chosen activation heights. `None` means
    /// the upgrade never activates.
    pub fn regtest_with(overwinter: Option<u32>, sapling: Option<u32>, nu5: Option<u32>) -> Self {
        Self {
            network: Network::RegTest,
            overwinter_activation: overwinter.map(BlockHeight::new),
            sapling_activation: sapling.map(BlockHeight::new),
            nu5_activation: nu5.map(BlockHeight::new),
            tx_expiry_delta: DEFAULT_TX_EXPIRY_DELTA,
        }
    }

    pub fn activation_height(&self, upgrade: NetworkUpgrade) -> Option<BlockHeight> {
        match upgrade {
            NetworkUpgrade::Sprout => Some(BlockHeight::genesis()),
            NetworkUpgrade::Overwinter => self.overwinter_activation,
            NetworkUpgrade::Sapling => self.sapling_activation,
            NetworkUpgrade::Nu5 => self.nu5_activation,
        }
    }

    pub fn is_active(&self, upgrade: NetworkUpgrade, height: BlockHeight) -> bool {
        self.activation_height(upgrade)
            .is_some_and(|activation| height >= activation)
    }

    /// The most recent upgrade active at `height`.
    pub fn current_upgrade(&self, height: BlockHeight) -> NetworkUpgrade {
        NetworkUpgrade::iter()
            .rev()
            .find(|upgrade| self.is_active(*upgrade, height))
            .unwrap_or(NetworkUpgrade::Sprout)
    }

    pub fn current_branch_id(&self, height: BlockHeight) -> u32 {
        self.current_upgrade(height).branch_id()
    }

    /// Expiry height of a transaction mined at `height`.
    pub fn expiry_height(&self, height: BlockHeight) -> BlockHeight {
        let expiry = height.value().saturating_add(self.tx_expiry_delta);
        BlockHeight::new(expiry.min(TX_EXPIRY_HEIGHT_THRESHOLD - 1))
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self::for_network(Network::default())
    }
}
