//! Exchange value objects returned by the `Exchange` collaborator

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub price_change_pct: Decimal,
}

impl Ticker {
    /// Unit-price ticker for the quote asset
    pub fn unit(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: Decimal::ONE,
            volume: Decimal::ZERO,
            price_change_pct: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

/// Priced offer to convert `from_amount` of one asset into another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionQuote {
    pub id: String,
    pub from_asset: String,
    pub to_asset: String,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub ratio: Decimal,
    pub inverse_ratio: Decimal,
    /// Seconds the quote stays acceptable
    pub valid_time_secs: u64,
    pub fee: Decimal,
    pub fee_asset: String,
}

impl ConversionQuote {
    pub fn validate(&self) -> Result<(), ValidationError> {
        const ENTITY: &str = "conversion quote";
        for (field, value) in [
            ("from amount", self.from_amount),
            ("to amount", self.to_amount),
            ("ratio", self.ratio),
            ("inverse ratio", self.inverse_ratio),
            ("fee", self.fee),
        ] {
            if value < Decimal::ZERO {
                return Err(ValidationError::negative(ENTITY, field, value));
            }
        }
        Ok(())
    }

    /// Relative deviation of the quoted destination value from the ticker-implied
    /// value of the position being converted
    ///
    /// `(dest_price * to_amount - source_price * position) / (source_price * position)`.
    /// Returns `None` when the position value is zero, so the ratio is undefined.
    pub fn drift(&self, source_price: Decimal, dest_price: Decimal, position: Decimal) -> Option<Decimal> {
        let origin_value = source_price * position;
        let quoted_value = dest_price * self.to_amount;
        if origin_value.is_zero() || dest_price.is_zero() {
            return None;
        }
        (quoted_value - origin_value).checked_div(origin_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOrder {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(from_amount: Decimal, to_amount: Decimal) -> ConversionQuote {
        ConversionQuote {
            id: "q-1".into(),
            from_asset: "BTC".into(),
            to_asset: "ETH".into(),
            from_amount,
            to_amount,
            ratio: dec!(20),
            inverse_ratio: dec!(0.05),
            valid_time_secs: 10,
            fee: Decimal::ZERO,
            fee_asset: "ETH".into(),
        }
    }

    #[test]
    fn test_drift() {
        // 1 BTC at 50000 quoted into 24.5 ETH at 2000 = 49000, a 2% loss
        let drift = quote(dec!(1), dec!(24.5)).drift(dec!(50000), dec!(2000), dec!(1));
        assert_eq!(drift, Some(dec!(-0.02)));

        // 25.5 ETH = 51000, a 2% gain
        let gain = quote(dec!(1), dec!(25.5)).drift(dec!(50000), dec!(2000), dec!(1));
        assert_eq!(gain, Some(dec!(0.02)));

        let fair = quote(dec!(1), dec!(25)).drift(dec!(50000), dec!(2000), dec!(1));
        assert_eq!(fair, Some(Decimal::ZERO));
    }

    #[test]
    fn test_drift_measured_against_full_position() {
        // quote covers half of a 2 BTC position
        let drift = quote(dec!(1), dec!(25)).drift(dec!(50000), dec!(2000), dec!(2));
        assert_eq!(drift, Some(dec!(-0.5)));
    }

    #[test]
    fn test_drift_undefined_for_zero_prices() {
        assert_eq!(quote(dec!(1), dec!(25)).drift(Decimal::ZERO, dec!(2000), dec!(1)), None);
        assert_eq!(quote(dec!(1), dec!(25)).drift(dec!(50000), Decimal::ZERO, dec!(1)), None);
        assert_eq!(quote(dec!(1), dec!(25)).drift(dec!(50000), dec!(2000), Decimal::ZERO), None);
    }

    #[test]
    fn test_quote_validation() {
        assert!(quote(dec!(1), dec!(25)).validate().is_ok());
        assert!(quote(dec!(-1), dec!(25)).validate().is_err());
    }
}
