use crate::bookings::{BookingStatus, PaymentStatus};
use crate::error::DomainError;

/// Service for validating booking status transitions
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - Pending → Accepted, Declined, Cancelled
    /// - Accepted → Completed, Cancelled
    /// - Declined, Completed, Cancelled → (terminal)
    ///
    /// Re-applying the current status is rejected, so a repeated decline or
    /// cancel fails instead of touching the payment or counters twice.
    pub fn is_valid_transition(from: BookingStatus, to: BookingStatus) -> bool {
        matches!(
            (from, to),
            (BookingStatus::Pending, BookingStatus::Accepted)
                | (BookingStatus::Pending, BookingStatus::Declined)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Accepted, BookingStatus::Completed)
                | (BookingStatus::Accepted, BookingStatus::Cancelled)
        )
    }

    /// Attempt to transition from one status to another
    pub fn transition(from: BookingStatus, to: BookingStatus) -> Result<BookingStatus, DomainError> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(DomainError::InvalidState(format!(
                "Cannot move booking from {} to {}",
                from, to
            )))
        }
    }

    /// Payment status a booking transition leaves behind, if it changes it
    pub fn payment_status_after(to: BookingStatus) -> Option<PaymentStatus> {
        match to {
            BookingStatus::Pending | BookingStatus::Accepted => None,
            BookingStatus::Declined => Some(PaymentStatus::Failed),
            BookingStatus::Completed => Some(PaymentStatus::Paid),
            BookingStatus::Cancelled => Some(PaymentStatus::Refunded),
        }
    }

    /// Change applied to the service booking counter by a transition
    pub fn booking_count_delta(to: BookingStatus) -> i32 {
        match to {
            BookingStatus::Declined | BookingStatus::Cancelled => -1,
            _ => 0,
        }
    }
}
