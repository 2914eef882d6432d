use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::catalog::{AddOn, PriceType};
use crate::error::DomainError;

/// Largest discount a bundle or group may grant, in percent
pub const MAX_DISCOUNT_PERCENT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

const SECONDS_PER_HOUR: i64 = 3600;

/// Inputs of a booking price computation
#[derive(Debug, Clone)]
pub struct PricingInput<'a> {
    pub price: Decimal,
    pub price_type: PriceType,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    /// Bundle discount in percent, only when the service belongs to the bundle
    pub bundle_discount: Option<Decimal>,
    pub add_ons: &'a [AddOn],
}

/// Service for calculating booking prices
///
/// Order of operations is fixed: duration pricing, then the bundle discount,
/// then add-ons (which are never discounted).
pub struct PriceCalculator;

impl PriceCalculator {
    /// Hours billed for a window; partial hours bill as a full hour
    ///
    /// A booking without an end date bills a single hour.
    pub fn billable_hours(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> i64 {
        match end {
            None => 1,
            Some(end) => {
                let seconds = (end - start).num_seconds().max(0);
                let hours = (seconds + SECONDS_PER_HOUR - 1) / SECONDS_PER_HOUR;
                hours.max(1)
            }
        }
    }

    /// Base price before discounts and add-ons
    pub fn duration_price(
        price: Decimal,
        price_type: PriceType,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Decimal {
        match price_type {
            PriceType::Fixed => price,
            PriceType::Hourly => price * Decimal::from(Self::billable_hours(start, end)),
        }
    }

    /// Take `percent` off `amount`, rounded to cents
    pub fn apply_discount(amount: Decimal, percent: Decimal) -> Decimal {
        let factor = Decimal::ONE - percent / Decimal::ONE_HUNDRED;
        (amount * factor).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Sum of add-on prices
    pub fn add_ons_total(add_ons: &[AddOn]) -> Decimal {
        add_ons.iter().map(|add_on| add_on.price).sum()
    }

    /// Reject discounts outside [0, 50]%
    pub fn validate_discount(percent: Decimal) -> Result<(), DomainError> {
        if percent < Decimal::ZERO || percent > MAX_DISCOUNT_PERCENT {
            return Err(DomainError::Validation(format!(
                "Discount must be between 0% and {}%, got {}%",
                MAX_DISCOUNT_PERCENT, percent
            )));
        }
        Ok(())
    }

    /// Calculate the total price of a booking
    pub fn calculate_total(input: &PricingInput<'_>) -> Result<Decimal, DomainError> {
        if input.price < Decimal::ZERO {
            return Err(DomainError::Validation("Service price cannot be negative".to_string()));
        }

        let mut base = Self::duration_price(input.price, input.price_type, input.start, input.end);
        if let Some(discount) = input.bundle_discount {
            Self::validate_discount(discount)?;
            base = Self::apply_discount(base, discount);
        }

        let total = base + Self::add_ons_total(input.add_ons);
        if total < Decimal::ZERO {
            return Err(DomainError::Validation("Total price cannot be negative".to_string()));
        }
        Ok(total)
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    proptest! {
        /// Hourly totals equal price * ceil(duration / 1h)
        #[test]
        fn prop_hourly_total_is_price_times_ceil_hours(
            price_cents in 0u32..=1_000_000u32,
            minutes in 1i64..=24 * 60,
        ) {
            let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
            let end = start + Duration::minutes(minutes);
            let price = Decimal::from(price_cents) / Decimal::from(100);
            let total = PriceCalculator::calculate_total(&PricingInput {
                price,
                price_type: PriceType::Hourly,
                start,
                end: Some(end),
                bundle_discount: None,
                add_ons: &[],
            }).unwrap();
            let hours = (minutes + 59) / 60;
            prop_assert_eq!(total, price * Decimal::from(hours));
        }

        /// A valid discount never raises the price
        #[test]
        fn prop_discount_never_increases_price(
            price_cents in 0u32..=1_000_000u32,
            discount in 0u32..=50u32,
        ) {
            let price = Decimal::from(price_cents) / Decimal::from(100);
            let discounted = PriceCalculator::apply_discount(price, Decimal::from(discount));
            prop_assert!(discounted <= price);
            prop_assert!(discounted >= Decimal::ZERO);
        }
    }
}
