use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::shielded::orchard::OrchardRawAddress;
use crate::models::blockchain::shielded::sapling::SaplingPaymentAddress;
use crate::models::blockchain::shielded::OutgoingViewingKey;
use crate::models::blockchain::sprout::keys::SproutPaymentAddress;
use crate::models::blockchain::transaction::transparent::TransparentAddress;

/// specifies where change goes when the inputs exceed outputs plus fee.
///
/// A builder holds at most one destination; setting a new one replaces the
/// previous. Without one, change falls back to the first shielded spend
/// address. Transparent addresses are only ever used when set explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::EnumIs)]
pub enum ChangeDestination {
    Transparent(TransparentAddress),

    Sapling {
        ovk: OutgoingViewingKey,
        address: SaplingPaymentAddress,
    },

    Orchard {
        ovk: OutgoingViewingKey,
        address: OrchardRawAddress,
    },

    Sprout(SproutPaymentAddress),
}

impl ChangeDestination {
    /// instantiate `Transparent` variant
    pub fn transparent(address: TransparentAddress) -> Self {
        Self::Transparent(address)
    }

    /// instantiate `Sapling` variant
    pub fn sapling(ovk: OutgoingViewingKey, address: SaplingPaymentAddress) -> Self {
        Self::Sapling { ovk, address }
    }

    /// instantiate `Orchard` variant
    pub fn orchard(ovk: OutgoingViewingKey, address: OrchardRawAddress) -> Self {
        Self::Orchard { ovk, address }
    }

    /// instantiate `Sprout` variant
    pub fn sprout(address: SproutPaymentAddress) -> Self {
        Self::Sprout(address)
    }
}
