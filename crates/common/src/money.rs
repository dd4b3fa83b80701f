use serde::{Deserialize, Serialize};

/// Money amount held in integer minor units (e.g. 1250 = 12.50).
///
/// The salon operates in a single currency, so no currency code is carried.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units.
    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Creates an amount from whole major units, saturating at the `i64`
    /// bounds.
    pub fn from_major(major: i64) -> Self {
        Self(major.saturating_mul(100))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns `percent`% of this amount, rounded toward zero.
    pub fn percent(&self, percent: u8) -> Money {
        let share = i128::from(self.0) * i128::from(percent) / 100;
        Money(i64::try_from(share).unwrap_or(if share < 0 { i64::MIN } else { i64::MAX }))
    }

    /// Subtracts `other`, clamping at zero.
    pub fn saturating_sub(&self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_major_scales_by_hundred() {
        assert_eq!(Money::from_major(35).minor(), 3500);
    }

    #[test]
    fn percent_rounds_down() {
        assert_eq!(Money::from_minor(999).percent(20), Money::from_minor(199));
        assert_eq!(Money::from_major(50).percent(100), Money::from_major(50));
    }

    #[test]
    fn saturating_sub_never_goes_negative() {
        let price = Money::from_major(10);
        assert_eq!(price.saturating_sub(Money::from_major(15)), Money::zero());
        assert_eq!(price.saturating_sub(Money::from_major(4)), Money::from_major(6));
    }

    #[test]
    fn arithmetic_saturates_at_the_bounds() {
        let huge = Money::from_minor(i64::MAX / 10);
        assert_eq!(huge.percent(20), Money::from_minor(i64::MAX / 10 / 5));
        assert_eq!(Money::from_minor(i64::MAX).percent(255), Money::from_minor(i64::MAX));
        assert_eq!(Money::from_minor(i64::MIN).percent(255), Money::from_minor(i64::MIN));

        assert_eq!(Money::from_major(i64::MAX).minor(), i64::MAX);
        assert_eq!(Money::from_major(i64::MIN).minor(), i64::MIN);

        let max = Money::from_minor(i64::MAX);
        assert_eq!(max.saturating_sub(Money::from_minor(i64::MIN)), max);
        assert_eq!(
            Money::from_minor(i64::MIN).saturating_sub(Money::from_minor(1)),
            Money::zero()
        );
        assert_eq!(max + Money::from_minor(1), max);
        assert_eq!(Money::from_minor(i64::MIN) - Money::from_minor(1), Money::from_minor(i64::MIN));
    }

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::from_minor(1250).to_string(), "12.50");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
    }
}
