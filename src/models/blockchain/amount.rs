use std::fmt::Display;
use std::iter::Sum;
use std::ops::Add;
use std::ops::Neg;
use std::ops::Sub;

use num_traits::CheckedAdd;
use num_traits::CheckedSub;
use num_traits::Zero;
use serde::Deserialize;
use serde::Serialize;

/// Number of zatoshis in one coin.
pub const COIN: i64 = 100_000_000;

/// The largest amount any single value field may carry.
pub const MAX_MONEY: i64 = 200_000_000 * COIN;

/// `Amount` records a signed quantity of zatoshis.
///
/// Value fields in transactions are non-negative and bounded by
/// [`MAX_MONEY`]; intermediate sums (value balances, change) may be negative,
/// which is why the representation is signed. `checked_add` and `checked_sub`
/// refuse results outside of `[-MAX_MONEY, MAX_MONEY]`. Use them for anything
/// derived from caller input; the plain operators do no range checking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn from_zat(zat: i64) -> Self {
        Self(zat)
    }

    pub const fn to_zat(self) -> i64 {
        self.0
    }

    pub fn max_money() -> Self {
        Self(MAX_MONEY)
    }

    /// Is this a valid value for a single output or input?
    pub fn in_money_range(&self) -> bool {
        (0..=MAX_MONEY).contains(&self.0)
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    /// Value encoding used inside note plaintexts and signature hashes.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Parse an unsigned 64-bit value, as stored in a note plaintext.
    pub fn from_u64(value: u64) -> Option<Self> {
        i64::try_from(value)
            .ok()
            .map(Self)
            .filter(|a| a.in_money_range())
    }
}

impl Display for Amount {
    /// Formats with at least two and at most eight decimals, e.g. `0.0001`,
    /// `12.50` or `-3.00`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n_abs = self.0.unsigned_abs();
        let coin = COIN.unsigned_abs();
        let digits = format!("{:08}", n_abs % coin);
        let decimals = digits.trim_end_matches('0');
        let decimals = if decimals.len() < 2 {
            &digits[..2]
        } else {
            decimals
        };
        let sign = if self.is_negative() { "-" } else { "" };
        write!(f, "{}{}.{}", sign, n_abs / coin, decimals)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Amount(iter.map(|a| a.0).sum())
    }
}

impl CheckedAdd for Amount {
    /// Return Some(self+other) if the result lies in `[-MAX_MONEY, MAX_MONEY]`.
    fn checked_add(&self, v: &Self) -> Option<Self> {
        self.0
            .checked_add(v.0)
            .filter(|sum| (-MAX_MONEY..=MAX_MONEY).contains(sum))
            .map(Self)
    }
}

impl CheckedSub for Amount {
    /// Return Some(self-other) if the result lies in `[-MAX_MONEY, MAX_MONEY]`.
    fn checked_sub(&self, v: &Self) -> Option<Self> {
        self.0
            .checked_sub(v.0)
            .filter(|diff| (-MAX_MONEY..=MAX_MONEY).contains(diff))
            .map(Self)
    }
}

impl Zero for Amount {
    fn zero() -> Self {
        Amount(0)
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Sum amounts with range checking, `None` on overflow.
pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
    amounts
        .into_iter()
        .try_fold(Amount::ZERO, |acc, a| acc.checked_add(&a))
}

#[cfg(test)]
mod tests {
    use proptest::prop_assert_eq;
    use test_strategy::proptest;

    use super::*;

    #[test]
    fn display_trims_trailing_zeros_but_keeps_two_decimals() {
        assert_eq!("0.0001", Amount::from_zat(10_000).to_string());
        assert_eq!("1.00", Amount::from_zat(COIN).to_string());
        assert_eq!("12.50", Amount::from_zat(1_250_000_000).to_string());
        assert_eq!("-3.00", Amount::from_zat(-3 * COIN).to_string());
        assert_eq!("0.00000001", Amount::from_zat(1).to_string());
    }

    #[test]
    fn money_range() {
        assert!(Amount::ZERO.in_money_range());
        assert!(Amount::max_money().in_money_range());
        assert!(!Amount::from_zat(-1).in_money_range());
        assert!(!Amount::from_zat(MAX_MONEY + 1).in_money_range());
    }

    #[test]
    fn checked_arithmetic_refuses_out_of_range() {
        let max = Amount::max_money();
        assert!(max.checked_add(&Amount::from_zat(1)).is_none());
        assert!((-max).checked_sub(&Amount::from_zat(1)).is_none());
        assert_eq!(
            Some(Amount::from_zat(-5)),
            Amount::from_zat(5).checked_sub(&Amount::from_zat(10))
        );
        assert!(checked_sum([max, max]).is_none());
        assert_eq!(Some(Amount::from_zat(3)), checked_sum([Amount::from_zat(1), Amount::from_zat(2)]));
    }

    #[test]
    fn u64_conversion_is_range_checked() {
        assert_eq!(Some(Amount::from_zat(42)), Amount::from_u64(42));
        assert!(Amount::from_u64(u64::MAX).is_none());
        assert!(Amount::from_u64(MAX_MONEY as u64 + 1).is_none());
    }

    #[proptest]
    fn checked_add_stays_within_money_range(
        #[strategy(-MAX_MONEY..=MAX_MONEY)] a: i64,
        #[strategy(-MAX_MONEY..=MAX_MONEY)] b: i64,
    ) {
        let expected = Some(a + b)
            .filter(|sum| (-MAX_MONEY..=MAX_MONEY).contains(sum))
            .map(Amount::from_zat);
        prop_assert_eq!(expected, Amount::from_zat(a).checked_add(&Amount::from_zat(b)));
    }
}
