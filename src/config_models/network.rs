use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default, EnumIter, strum::EnumIs,
)]
#[non_exhaustive]
pub enum Network {
    /// Komodo main net.
    #[default]
    Main,

    /// Public test network. Every upgrade up to Sapling is active from the
    /// first block.
    Testnet,

    /// Network for individual unit and integration tests. Upgrade activation
    /// heights are chosen by the test; see
    /// [`ConsensusParams::regtest_with`](super::consensus_params::ConsensusParams::regtest_with).
    RegTest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Network::Testnet => "testnet",
            Network::RegTest => "regtest",
            Network::Main => "main",
        };
        write!(f, "{}", string)
    }
}
