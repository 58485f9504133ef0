use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Weight normalization base: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Upper bound enforced on the protocol fee rate (10%).
pub const MAX_FEE_BPS: u16 = 1_000;

/// Decimal places of the settlement token (USD stablecoin).
pub const USD_DECIMALS: u32 = 6;

const USD_BASE_UNIT: u128 = 1_000_000; // 10^6

/// A settlement-token amount in 6-decimal base units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UsdAmount(u128);

impl UsdAmount {
    pub const ZERO: Self = Self(0);

    pub fn from_usd(usd: f64) -> Self {
        Self((usd * USD_BASE_UNIT as f64) as u128)
    }

    pub fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    pub fn to_usd(&self) -> f64 {
        self.0 as f64 / USD_BASE_UNIT as f64
    }

    pub fn to_base_units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Floor of `self * numerator / denominator`, overflow-free for any
    /// amount as long as `numerator <= denominator <= u32::MAX`.
    ///
    /// The decomposition `a = q*d + r` gives
    /// `floor(a*n/d) = q*n + floor(r*n/d)` with `r*n < d*n` fitting u128.
    pub fn mul_div_floor(&self, numerator: u32, denominator: u32) -> Self {
        debug_assert!(denominator > 0);
        let d = denominator as u128;
        let n = numerator as u128;
        let q = self.0 / d;
        let r = self.0 % d;
        Self(q * n + r * n / d)
    }

    /// Floor share of this amount at `bps` basis points.
    pub fn bps_share(&self, bps: u16) -> Self {
        self.mul_div_floor(bps as u32, BPS_DENOMINATOR)
    }
}

impl Sum for UsdAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc.saturating_add(x))
    }
}

impl fmt::Display for UsdAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6} USD", self.to_usd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_unit_conversion() {
        let amount = UsdAmount::from_usd(100.0);
        assert_eq!(amount.to_base_units(), 100_000_000);
        assert_eq!(UsdAmount::from_base_units(2_500_000).to_usd(), 2.5);
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = UsdAmount::from_base_units(u128::MAX);
        assert!(a.checked_add(UsdAmount::from_base_units(1)).is_none());
        assert!(UsdAmount::ZERO.checked_sub(UsdAmount::from_base_units(1)).is_none());
    }

    #[test]
    fn test_bps_share_floor() {
        // 250 bps of 100.0 USD = 2.5 USD
        let amount = UsdAmount::from_base_units(100_000_000);
        assert_eq!(amount.bps_share(250).to_base_units(), 2_500_000);

        // Floor division: 1 base unit at 250 bps rounds down to zero
        assert_eq!(UsdAmount::from_base_units(1).bps_share(250), UsdAmount::ZERO);
        assert_eq!(UsdAmount::from_base_units(39).bps_share(250), UsdAmount::ZERO);
        assert_eq!(UsdAmount::from_base_units(40).bps_share(250).to_base_units(), 1);
    }

    #[test]
    fn test_mul_div_no_overflow_on_huge_amounts() {
        let huge = UsdAmount::from_base_units(u128::MAX - 5);
        let share = huge.mul_div_floor(8000, 10_000);
        assert!(share < huge);
        assert!(share > huge.mul_div_floor(2000, 10_000));
    }

    #[test]
    fn test_fee_plus_remainder_is_exact() {
        let amount = UsdAmount::from_base_units(999_999_999_999);
        let fee = amount.bps_share(MAX_FEE_BPS);
        let remainder = amount.checked_sub(fee).unwrap();
        assert_eq!(fee.saturating_add(remainder), amount);
    }
}
