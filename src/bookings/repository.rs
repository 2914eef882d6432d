use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::bookings::{
    escrow_release_date, Booking, BookingStatus, CapacityGuard, FeeBreakdown, NewBooking, PartyRole, Payment,
    PaymentStatus, StatusMachine, TimeSlot, Window,
};
use crate::error::{DomainError, DomainResult};
use crate::groups::GroupStatus;

/// Seat reservation checked atomically with a group member insert
#[derive(Debug, Clone, Copy)]
pub struct GroupSeat {
    pub group_booking_id: Uuid,
    pub max_participants: i32,
}

/// Capacity rules re-checked inside the creating transaction
#[derive(Debug, Clone, Default)]
pub struct CreateGuards {
    pub max_per_day: Option<i32>,
    pub group: Option<GroupSeat>,
    /// Window that must not fall inside any of the provider's buffer slots
    pub buffer_check: Option<Window>,
}

/// Everything a status transition writes, applied in one transaction
#[derive(Debug, Clone)]
pub struct TransitionChange {
    pub expected: BookingStatus,
    pub to: BookingStatus,
    pub reason: Option<String>,
    pub actor: Option<Uuid>,
    pub at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub payment_status: Option<PaymentStatus>,
    pub escrow_release_date: Option<DateTime<Utc>>,
    /// Refund the full payment amount
    pub refund: bool,
    pub booking_count_delta: i32,
    /// Drop the buffer slots held by the booking
    pub release_slots: bool,
}

impl TransitionChange {
    pub fn new(expected: BookingStatus, to: BookingStatus, at: DateTime<Utc>) -> Self {
        let completed_at = (to == BookingStatus::Completed).then_some(at);
        Self {
            expected,
            to,
            reason: None,
            actor: None,
            at,
            completed_at,
            payment_status: StatusMachine::payment_status_after(to),
            escrow_release_date: completed_at.map(escrow_release_date),
            refund: to == BookingStatus::Cancelled,
            booking_count_delta: StatusMachine::booking_count_delta(to),
            release_slots: to.is_withdrawn(),
        }
    }

    /// Record who withdrew the booking and why
    pub fn withdrawn_by(mut self, actor: Uuid, reason: Option<String>) -> Self {
        self.actor = Some(actor);
        self.reason = reason;
        self
    }
}

/// Persistence of bookings, their payments and blocked time slots
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a booking with its pending payment and bump the service counter
    ///
    /// Fails with `Conflict` when a guard no longer holds at insert time.
    async fn create(
        &self,
        booking: NewBooking,
        fees: FeeBreakdown,
        guards: &CreateGuards,
    ) -> DomainResult<(Booking, Payment)>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Booking>>;

    async fn find_payment(&self, booking_id: Uuid) -> DomainResult<Option<Payment>>;

    /// Apply `change` only if the booking is still in `change.expected`
    ///
    /// Returns `None` when the booking moved on in the meantime.
    async fn transition(&self, id: Uuid, change: &TransitionChange) -> DomainResult<Option<Booking>>;

    async fn find_for_user(
        &self,
        user_id: Uuid,
        role: Option<PartyRole>,
        status: Option<BookingStatus>,
    ) -> DomainResult<Vec<Booking>>;

    async fn find_by_recurring(&self, series_id: Uuid) -> DomainResult<Vec<Booking>>;

    async fn find_by_group(&self, group_id: Uuid) -> DomainResult<Vec<Booking>>;

    async fn insert_time_slots(&self, slots: &[TimeSlot]) -> DomainResult<()>;

    async fn find_time_slots(&self, booking_id: Uuid) -> DomainResult<Vec<TimeSlot>>;
}

const BOOKING_COLUMNS: &str = "id, service_id, client_id, provider_id, booking_date, end_date, total_price, \
     status, notes, address, cancellation_reason, cancelled_by, completed_at, recurring_booking_id, \
     group_booking_id, is_recurring, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, booking_id, amount, status, service_fee, net_amount, escrow_release_date, \
     refund_amount, refunded_at, created_at, updated_at";

/// Booking repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create(
        &self,
        booking: NewBooking,
        fees: FeeBreakdown,
        guards: &CreateGuards,
    ) -> DomainResult<(Booking, Payment)> {
        let mut tx = self.pool.begin().await?;

        // Creations for one service are serialized on the service row
        sqlx::query("SELECT id FROM services WHERE id = $1 FOR UPDATE")
            .bind(booking.service_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DomainError::not_found("Service", booking.service_id))?;

        if let Some(max) = guards.max_per_day {
            let day = Window::day(booking.booking_date.date_naive());
            let (active,): (i64,) = sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM bookings
                WHERE service_id = $1
                  AND status IN ('pending', 'accepted')
                  AND booking_date >= $2 AND booking_date < $3
                "#,
            )
            .bind(booking.service_id)
            .bind(day.start)
            .bind(day.end)
            .fetch_one(&mut *tx)
            .await?;

            CapacityGuard::check_daily_limit(Some(max), active)?;
        }

        if let Some(seat) = guards.group {
            let status: Option<(GroupStatus,)> =
                sqlx::query_as("SELECT status FROM group_bookings WHERE id = $1 FOR UPDATE")
                    .bind(seat.group_booking_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            match status {
                None => return Err(DomainError::not_found("GroupBooking", seat.group_booking_id)),
                Some((status,)) => status.ensure_accepting()?,
            }

            let (members, already_member): (i64, bool) = sqlx::query_as(
                r#"
                SELECT COUNT(*), COALESCE(BOOL_OR(client_id = $2), FALSE)
                FROM bookings
                WHERE group_booking_id = $1 AND status NOT IN ('declined', 'cancelled')
                "#,
            )
            .bind(seat.group_booking_id)
            .bind(booking.client_id)
            .fetch_one(&mut *tx)
            .await?;

            if already_member {
                return Err(DomainError::Conflict("Already a participant of this group".to_string()));
            }
            if members >= i64::from(seat.max_participants) {
                return Err(DomainError::Conflict("Group booking is full".to_string()));
            }
        }

        if let Some(window) = guards.buffer_check {
            let (blocked,): (bool,) = sqlx::query_as(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM time_slots
                    WHERE provider_id = $1 AND start_time < $3 AND end_time > $2
                )
                "#,
            )
            .bind(booking.provider_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&mut *tx)
            .await?;

            if blocked {
                return Err(DomainError::Conflict(
                    "Requested time falls inside the provider's buffer time".to_string(),
                ));
            }
        }

        let inserted = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings (id, service_id, client_id, provider_id, booking_date, end_date,
                                  total_price, status, notes, address, recurring_booking_id,
                                  group_booking_id, is_recurring, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10, $11, $12, $13, $13)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.service_id)
        .bind(booking.client_id)
        .bind(booking.provider_id)
        .bind(booking.booking_date)
        .bind(booking.end_date)
        .bind(booking.total_price)
        .bind(&booking.notes)
        .bind(&booking.address)
        .bind(booking.recurring_booking_id)
        .bind(booking.group_booking_id)
        .bind(booking.recurring_booking_id.is_some())
        .bind(booking.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (id, booking_id, amount, status, service_fee, net_amount, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $6, $6)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(inserted.id)
        .bind(fees.amount)
        .bind(fees.service_fee)
        .bind(fees.net_amount)
        .bind(booking.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE services SET booking_count = booking_count + 1 WHERE id = $1")
            .bind(inserted.service_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((inserted, payment))
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn find_payment(&self, booking_id: Uuid) -> DomainResult<Option<Payment>> {
        let payment =
            sqlx::query_as::<_, Payment>(&format!("SELECT {} FROM payments WHERE booking_id = $1", PAYMENT_COLUMNS))
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(payment)
    }

    async fn transition(&self, id: Uuid, change: &TransitionChange) -> DomainResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET status = $1,
                cancellation_reason = COALESCE($2, cancellation_reason),
                cancelled_by = COALESCE($3, cancelled_by),
                completed_at = COALESCE($4, completed_at),
                updated_at = $5
            WHERE id = $6 AND status = $7
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(change.to)
        .bind(&change.reason)
        .bind(change.actor)
        .bind(change.completed_at)
        .bind(change.at)
        .bind(id)
        .bind(change.expected)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(booking) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(payment_status) = change.payment_status {
            sqlx::query(
                r#"
                UPDATE payments
                SET status = $1,
                    escrow_release_date = COALESCE($2, escrow_release_date),
                    refund_amount = CASE WHEN $3 THEN amount ELSE refund_amount END,
                    refunded_at = CASE WHEN $3 THEN $4 ELSE refunded_at END,
                    updated_at = $4
                WHERE booking_id = $5
                "#,
            )
            .bind(payment_status)
            .bind(change.escrow_release_date)
            .bind(change.refund)
            .bind(change.at)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        if change.booking_count_delta != 0 {
            sqlx::query("UPDATE services SET booking_count = GREATEST(booking_count + $1, 0) WHERE id = $2")
                .bind(change.booking_count_delta)
                .bind(booking.service_id)
                .execute(&mut *tx)
                .await?;
        }

        if change.release_slots {
            sqlx::query("DELETE FROM time_slots WHERE booking_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Some(booking))
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        role: Option<PartyRole>,
        status: Option<BookingStatus>,
    ) -> DomainResult<Vec<Booking>> {
        let party_filter = match role {
            Some(PartyRole::Client) => "client_id = $1",
            Some(PartyRole::Provider) => "provider_id = $1",
            None => "(client_id = $1 OR provider_id = $1)",
        };

        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE {} AND ($2::text IS NULL OR status = $2)
            ORDER BY booking_date DESC
            "#,
            BOOKING_COLUMNS, party_filter
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn find_by_recurring(&self, series_id: Uuid) -> DomainResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE recurring_booking_id = $1 ORDER BY booking_date",
            BOOKING_COLUMNS
        ))
        .bind(series_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn find_by_group(&self, group_id: Uuid) -> DomainResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE group_booking_id = $1 ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn insert_time_slots(&self, slots: &[TimeSlot]) -> DomainResult<()> {
        if slots.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for slot in slots {
            sqlx::query(
                r#"
                INSERT INTO time_slots (id, service_id, provider_id, booking_id, start_time, end_time, kind, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(slot.id)
            .bind(slot.service_id)
            .bind(slot.provider_id)
            .bind(slot.booking_id)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(slot.kind)
            .bind(slot.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn find_time_slots(&self, booking_id: Uuid) -> DomainResult<Vec<TimeSlot>> {
        let slots = sqlx::query_as::<_, TimeSlot>(
            r#"
            SELECT id, service_id, provider_id, booking_id, start_time, end_time, kind, created_at
            FROM time_slots
            WHERE booking_id = $1
            ORDER BY start_time
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }
}
