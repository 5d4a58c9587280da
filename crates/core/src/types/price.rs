//! Euro amounts using decimal arithmetic.
//!
//! Catalogue prices are stored without VAT (IVA). Everything the customer
//! sees (cart lines, order totals, feed prices) is VAT-inclusive, so the
//! conversion lives here rather than in each caller.

use core::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Spanish VAT rate applied to catalogue prices.
pub const VAT_RATE: Decimal = Decimal::from_parts(21, 0, 0, false, 2);

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input string is empty.
    #[error("amount cannot be empty")]
    Empty,
    /// The input is not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// The amount is negative.
    #[error("amount cannot be negative")]
    Negative,
}

/// An amount of money in euros.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero euros.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build a price from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Parse a user-entered amount. Accepts `,` or `.` as decimal separator.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, not numeric, or negative.
    pub fn parse_amount(input: &str) -> Result<Self, PriceError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PriceError::Empty);
        }
        let normalized = trimmed.replace(',', ".");
        let amount = Decimal::from_str(&normalized)
            .map_err(|_| PriceError::Invalid(trimmed.to_owned()))?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount with VAT applied, rounded to cents.
    #[must_use]
    pub fn with_vat(&self) -> Self {
        Self(
            (self.0 * (Decimal::ONE + VAT_RATE))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Amount rounded to cents.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Amount in integer cents, as payment gateways expect it.
    #[must_use]
    pub fn to_cents(&self) -> i64 {
        let cents = (self.0 * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents.to_i64().unwrap_or(i64::MAX)
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Format for the merchant feed (`"12.10 EUR"`).
    #[must_use]
    pub fn feed_format(&self) -> String {
        format!("{:.2} EUR", self.rounded().0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} €", self.rounded().0)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl core::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::Mul<i32> for Price {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl core::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, p| acc + p)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn eur(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_parse_amount_accepts_comma() {
        assert_eq!(Price::parse_amount("12,50").unwrap(), eur("12.50"));
        assert_eq!(Price::parse_amount(" 3.2 ").unwrap(), eur("3.2"));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(Price::parse_amount(""), Err(PriceError::Empty));
        assert!(matches!(
            Price::parse_amount("doce"),
            Err(PriceError::Invalid(_))
        ));
        assert_eq!(Price::parse_amount("-1"), Err(PriceError::Negative));
    }

    #[test]
    fn test_with_vat_rounds_to_cents() {
        assert_eq!(eur("100").with_vat(), eur("121.00"));
        assert_eq!(eur("10.05").with_vat(), eur("12.16"));
        assert_eq!(eur("0").with_vat(), Price::ZERO);
    }

    #[test]
    fn test_to_cents() {
        assert_eq!(eur("12.10").to_cents(), 1210);
        assert_eq!(eur("0.005").to_cents(), 1);
        assert_eq!(eur("150").to_cents(), 15000);
        assert_eq!(Price::from_cents(1210), eur("12.10"));
    }

    #[test]
    fn test_display_and_feed_format() {
        assert_eq!(eur("12.1").to_string(), "12.10 €");
        assert_eq!(eur("7").feed_format(), "7.00 EUR");
    }

    #[test]
    fn test_sum_and_mul() {
        let total: Price = [eur("1.10"), eur("2.20")].into_iter().sum();
        assert_eq!(total, eur("3.30"));
        assert_eq!(eur("2.50") * 3, eur("7.50"));
    }
}
