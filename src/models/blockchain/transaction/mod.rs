pub mod sighash;
pub mod transparent;

use num_traits::CheckedAdd;
use serde::Deserialize;
use serde::Serialize;

use self::transparent::TxIn;
use self::transparent::TxOut;
use super::amount::Amount;
use super::block_height::BlockHeight;
use super::digest::byte_array;
use super::shielded::bundle::AuthorizedBundle;
use super::sprout::joinsplit::JsDescription;
use crate::config_models::consensus_params::ConsensusParams;
use crate::config_models::consensus_params::NetworkUpgrade;

pub const OVERWINTER_VERSION_GROUP_ID: u32 = 0x03C4_8270;
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892F_2085;
pub const ZIP225_VERSION_GROUP_ID: u32 = 0x26A7_270A;

/// The transaction format: `fOverwintered`, `nVersion` and
/// `nVersionGroupId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxVersion {
    pub overwintered: bool,
    pub version: u32,
    pub version_group_id: u32,
}

impl TxVersion {
    pub const SPROUT: Self = Self::legacy(1);

    /// The first format able to carry JoinSplits.
    pub const SPROUT_JOINSPLIT: Self = Self::legacy(2);

    pub const OVERWINTER: Self = Self {
        overwintered: true,
        version: 3,
        version_group_id: OVERWINTER_VERSION_GROUP_ID,
    };

    pub const SAPLING: Self = Self {
        overwintered: true,
        version: 4,
        version_group_id: SAPLING_VERSION_GROUP_ID,
    };

    pub const ZIP225: Self = Self {
        overwintered: true,
        version: 5,
        version_group_id: ZIP225_VERSION_GROUP_ID,
    };

    const fn legacy(version: u32) -> Self {
        Self {
            overwintered: false,
            version,
            version_group_id: 0,
        }
    }

    /// The newest format valid while `upgrade` is the latest active upgrade.
    pub fn for_upgrade(upgrade: NetworkUpgrade) -> Self {
        match upgrade {
            NetworkUpgrade::Sprout => Self::SPROUT,
            NetworkUpgrade::Overwinter => Self::OVERWINTER,
            NetworkUpgrade::Sapling => Self::SAPLING,
            NetworkUpgrade::Nu5 => Self::ZIP225,
        }
    }

    /// The 32-bit header field: version with the overwintered flag in the
    /// top bit.
    pub fn header(&self) -> u32 {
        self.version | (u32::from(self.overwintered) << 31)
    }

    pub fn supports_join_splits(&self) -> bool {
        (2..=4).contains(&self.version)
    }

    pub fn supports_sapling(&self) -> bool {
        self.overwintered && self.version >= 4
    }

    pub fn supports_orchard(&self) -> bool {
        self.overwintered && self.version >= 5
    }
}

/// A transaction spanning the transparent, Sprout, Sapling and Orchard pools.
///
/// Value flows into the transparent value pool from transparent inputs,
/// from each JoinSplit's `vpub_new` and from positive shielded value
/// balances; it flows out through transparent outputs, `vpub_old` and
/// negative value balances. Whatever is left over is the miner fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: TxVersion,

    /// Branch id the transaction commits to in its signature hashes.
    pub consensus_branch_id: u32,
    pub lock_time: u32,
    pub expiry_height: BlockHeight,

    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,

    pub join_splits: Vec<JsDescription>,
    pub join_split_pub_key: [u8; 32],
    #[serde(with = "byte_array")]
    pub join_split_sig: [u8; 64],

    pub sapling_bundle: Option<AuthorizedBundle>,
    pub orchard_bundle: Option<AuthorizedBundle>,
}

impl Transaction {
    /// An empty transaction in the newest format the network accepts at
    /// `height`.
    pub fn new_contextual(params: &ConsensusParams, height: BlockHeight) -> Self {
        let upgrade = params.current_upgrade(height);
        let version = TxVersion::for_upgrade(upgrade);
        let expiry_height = if version.overwintered {
            params.expiry_height(height)
        } else {
            BlockHeight::genesis()
        };

        Self {
            version,
            consensus_branch_id: upgrade.branch_id(),
            lock_time: 0,
            expiry_height,
            vin: vec![],
            vout: vec![],
            join_splits: vec![],
            join_split_pub_key: [0u8; 32],
            join_split_sig: [0u8; 64],
            sapling_bundle: None,
            orchard_bundle: None,
        }
    }

    /// Switch to the newest format that can carry JoinSplits. Version 5
    /// transactions fall back to version 4; pre-Overwinter transactions move
    /// to version 2.
    pub fn downgrade_for_join_splits(&mut self) {
        if self.version.supports_join_splits() {
            return;
        }
        self.version = if self.version.overwintered {
            TxVersion::SAPLING
        } else {
            TxVersion::SPROUT_JOINSPLIT
        };
    }

    pub fn value_balance_sapling(&self) -> Amount {
        self.sapling_bundle
            .as_ref()
            .map_or(Amount::ZERO, |b| b.value_balance)
    }

    pub fn value_balance_orchard(&self) -> Amount {
        self.orchard_bundle
            .as_ref()
            .map_or(Amount::ZERO, |b| b.value_balance)
    }

    pub fn transparent_value_out(&self) -> Option<Amount> {
        self.vout
            .iter()
            .try_fold(Amount::ZERO, |acc, out| acc.checked_add(&out.value))
    }

    /// Net value the JoinSplits release into the transparent pool:
    /// `sum(vpub_new) - sum(vpub_old)`.
    pub fn join_split_value_balance(&self) -> Option<Amount> {
        self.join_splits.iter().try_fold(Amount::ZERO, |acc, js| {
            acc.checked_add(&js.vpub_new)?
                .checked_add(&-js.vpub_old)
        })
    }
}
