use std::fmt::Display;
use std::ops::Add;
use std::ops::Sub;

use serde::Deserialize;
use serde::Serialize;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash,
)]
pub struct BlockHeight(u32);

impl BlockHeight {
    pub const fn new(height: u32) -> Self {
        Self(height)
    }

    pub const fn genesis() -> Self {
        Self(0)
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == 0
    }

    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn previous(&self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Little-endian encoding, as committed to in transaction headers.
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<u32> for BlockHeight {
    fn from(val: u32) -> Self {
        BlockHeight(val)
    }
}

impl From<BlockHeight> for u32 {
    fn from(bh: BlockHeight) -> Self {
        bh.0
    }
}

impl From<BlockHeight> for u64 {
    fn from(bh: BlockHeight) -> Self {
        u64::from(bh.0)
    }
}

impl Add<u32> for BlockHeight {
    type Output = BlockHeight;

    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub for BlockHeight {
    type Output = i64;

    fn sub(self, rhs: Self) -> Self::Output {
        i64::from(self.0) - i64::from(rhs.0)
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
