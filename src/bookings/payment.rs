use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform share of every booking amount (10%)
pub const SERVICE_FEE_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Days between completion and the provider's funds becoming available
pub const ESCROW_RELEASE_DAYS: i64 = 15;

/// Payment status enum mirroring the booking lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Financial record attached one-to-one to a booking
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub service_fee: Decimal,
    pub net_amount: Decimal,
    pub escrow_release_date: Option<DateTime<Utc>>,
    pub refund_amount: Option<Decimal>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Split of a booking amount into platform fee and provider share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub amount: Decimal,
    pub service_fee: Decimal,
    pub net_amount: Decimal,
}

impl FeeBreakdown {
    /// `service_fee + net_amount == amount` holds exactly
    pub fn for_amount(amount: Decimal) -> Self {
        let service_fee =
            (amount * SERVICE_FEE_RATE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            amount,
            service_fee,
            net_amount: amount - service_fee,
        }
    }
}

/// Date the provider's share of a completed booking is released
pub fn escrow_release_date(completed_at: DateTime<Utc>) -> DateTime<Utc> {
    completed_at + Duration::days(ESCROW_RELEASE_DAYS)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Fee and net amount always add up to the booking amount
        #[test]
        fn prop_fee_split_sums_to_amount(cents in 0u64..=100_000_000u64) {
            let amount = Decimal::from(cents) / Decimal::from(100);
            let split = FeeBreakdown::for_amount(amount);
            prop_assert_eq!(split.service_fee + split.net_amount, amount);
            prop_assert!(split.service_fee >= Decimal::ZERO);
            prop_assert!(split.net_amount >= Decimal::ZERO);
        }
    }
}
