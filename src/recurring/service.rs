use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::{Booking, BookingOrigin, BookingRepository, BookingService, CreateBookingRequest};
use crate::catalog::CatalogRepository;
use crate::clock::Clock;
use crate::error::{DomainError, DomainResult};
use crate::recurring::{
    CreateRecurringRequest, GenerationReport, RecurrenceRule, RecurringBooking, RecurringRepository,
    RecurringSeriesDetails, RecurringStatus, BATCH_SIZE,
};

const PAUSE_REASON: &str = "Recurring series paused";
const CANCEL_REASON: &str = "Recurring series cancelled";

/// Lifecycle of recurring series and batched materialization of their bookings
#[derive(Clone)]
pub struct RecurringService {
    repo: Arc<dyn RecurringRepository>,
    bookings: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogRepository>,
    booking_service: Arc<BookingService>,
    clock: Arc<dyn Clock>,
}

/// Result of extending one series
struct Extension {
    created: usize,
    completed: bool,
}

impl RecurringService {
    pub fn new(
        repo: Arc<dyn RecurringRepository>,
        bookings: Arc<dyn BookingRepository>,
        catalog: Arc<dyn CatalogRepository>,
        booking_service: Arc<BookingService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            bookings,
            catalog,
            booking_service,
            clock,
        }
    }

    /// Create a series and materialize its first batch of bookings
    ///
    /// Occurrences whose booking cannot be created (capacity, buffer) are
    /// skipped; the series itself is kept.
    pub async fn create_series(
        &self,
        client_id: Uuid,
        request: CreateRecurringRequest,
    ) -> DomainResult<RecurringSeriesDetails> {
        tracing::debug!(%client_id, service_id = %request.service_id, "creating recurring series");
        request.validate()?;

        let rule = RecurrenceRule::new(
            request.frequency,
            request.interval,
            request.start_date,
            request.end_date,
            request.occurrences,
            &request.days_of_week,
            request.day_of_month,
            request.time_of_day,
        )?;

        let service = self
            .catalog
            .find_service(request.service_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Service", request.service_id))?;

        if !service.is_active() {
            return Err(DomainError::InvalidState("Service is not accepting bookings".to_string()));
        }
        if service.provider_id == client_id {
            return Err(DomainError::Forbidden("Providers cannot book their own services".to_string()));
        }

        let now = self.clock.now();
        let first_batch = rule.instants_after(now, BATCH_SIZE);
        if first_batch.is_empty() {
            return Err(DomainError::Validation(
                "Recurrence has no occurrences in the future".to_string(),
            ));
        }

        let series = self
            .repo
            .insert(&RecurringBooking {
                id: Uuid::new_v4(),
                service_id: service.id,
                client_id,
                provider_id: service.provider_id,
                frequency: rule.frequency,
                interval: rule.interval as i32,
                start_date: rule.start_date,
                end_date: rule.end_date,
                occurrences: rule.max_occurrences as i32,
                days_of_week: rule.days_of_week.iter().map(|d| *d as i32).collect(),
                day_of_month: rule.day_of_month.map(|d| d as i32),
                time_of_day: rule.time_of_day,
                duration_minutes: request.duration_minutes,
                status: RecurringStatus::Active,
                notes: request.notes,
                address: request.address,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            series_id = %series.id,
            frequency = ?series.frequency,
            occurrences = series.occurrences,
            "recurring series created"
        );

        let bookings = self.materialize(&series, &first_batch).await;
        Ok(RecurringSeriesDetails { series, bookings })
    }

    /// Extend every active series that is running low on upcoming bookings
    ///
    /// Look-ahead is capped: a series is topped up from its latest booking date
    /// until it holds one batch of upcoming bookings, never more. Driven by the
    /// periodic job. A failing series is logged and skipped.
    pub async fn generate_upcoming(&self) -> DomainResult<GenerationReport> {
        let mut report = GenerationReport::default();

        for series in self.repo.find_active().await? {
            report.series_scanned += 1;
            match self.extend(&series).await {
                Ok(extension) => {
                    report.bookings_created += extension.created;
                    if extension.completed {
                        report.series_completed += 1;
                    }
                }
                Err(e) => tracing::warn!(series_id = %series.id, error = %e, "recurring series not extended"),
            }
        }

        if report.bookings_created > 0 || report.series_completed > 0 {
            tracing::info!(
                scanned = report.series_scanned,
                created = report.bookings_created,
                completed = report.series_completed,
                "recurring generation pass"
            );
        }
        Ok(report)
    }

    /// Pause an active series and cancel its future bookings
    pub async fn pause(&self, actor_id: Uuid, series_id: Uuid) -> DomainResult<RecurringSeriesDetails> {
        let series = self.load_owned(actor_id, series_id).await?;
        let series = self
            .move_to(&series, &[RecurringStatus::Active], RecurringStatus::Paused)
            .await?;

        self.cancel_future_children(&series, actor_id, PAUSE_REASON).await?;
        self.details(series).await
    }

    /// Reactivate a paused series and materialize a batch from `resume_date`
    pub async fn resume(
        &self,
        actor_id: Uuid,
        series_id: Uuid,
        resume_date: NaiveDate,
    ) -> DomainResult<RecurringSeriesDetails> {
        let series = self.load_owned(actor_id, series_id).await?;
        let rule = RecurrenceRule::from_series(&series)?;
        let series = self
            .move_to(&series, &[RecurringStatus::Paused], RecurringStatus::Active)
            .await?;

        let taken: HashSet<DateTime<Utc>> = self
            .bookings
            .find_by_recurring(series.id)
            .await?
            .into_iter()
            .filter(|b| !b.status.is_withdrawn())
            .map(|b| b.booking_date)
            .collect();

        let now = self.clock.now();
        let batch: Vec<DateTime<Utc>> = rule
            .instants()
            .into_iter()
            .filter(|at| at.date_naive() >= resume_date && *at > now && !taken.contains(at))
            .take(BATCH_SIZE)
            .collect();

        tracing::debug!(series_id = %series.id, %resume_date, occurrences = batch.len(), "resuming series");
        self.materialize(&series, &batch).await;
        self.details(series).await
    }

    /// Cancel an active or paused series and its future bookings
    pub async fn cancel_series(&self, actor_id: Uuid, series_id: Uuid) -> DomainResult<RecurringSeriesDetails> {
        let series = self.load_owned(actor_id, series_id).await?;
        let series = self
            .move_to(
                &series,
                &[RecurringStatus::Active, RecurringStatus::Paused],
                RecurringStatus::Cancelled,
            )
            .await?;

        self.cancel_future_children(&series, actor_id, CANCEL_REASON).await?;
        self.details(series).await
    }

    pub async fn get_series(&self, actor_id: Uuid, series_id: Uuid) -> DomainResult<RecurringSeriesDetails> {
        let series = self.load_owned(actor_id, series_id).await?;
        self.details(series).await
    }

    pub async fn list_series(&self, actor_id: Uuid) -> DomainResult<Vec<RecurringBooking>> {
        self.repo.find_for_user(actor_id).await
    }

    /// Top the series up to a full batch of upcoming bookings
    async fn extend(&self, series: &RecurringBooking) -> DomainResult<Extension> {
        let rule = RecurrenceRule::from_series(series)?;
        let children = self.bookings.find_by_recurring(series.id).await?;
        let now = self.clock.now();

        let upcoming = children
            .iter()
            .filter(|b| b.booking_date > now && !b.status.is_terminal())
            .count();
        let latest = children.iter().map(|b| b.booking_date).max();
        let anchor = latest.map_or(now, |latest| latest.max(now));

        let mut created = 0;
        let mut last_planned = anchor;
        if upcoming < BATCH_SIZE {
            let batch = rule.instants_after(anchor, BATCH_SIZE - upcoming);
            if let Some(last) = batch.last() {
                last_planned = *last;
            }
            created = self.materialize(series, &batch).await.len();
        }

        let exhausted = rule.instants_after(last_planned, 1).is_empty();
        let completed = exhausted
            && self
                .repo
                .update_status(series.id, &[RecurringStatus::Active], RecurringStatus::Completed, now)
                .await?
                .is_some();

        if completed {
            tracing::info!(series_id = %series.id, "recurring series completed");
        }
        Ok(Extension { created, completed })
    }

    /// Create one booking per instant, skipping occurrences that fail
    async fn materialize(&self, series: &RecurringBooking, instants: &[DateTime<Utc>]) -> Vec<Booking> {
        let mut created = Vec::with_capacity(instants.len());

        for at in instants {
            let mut request = CreateBookingRequest::new(series.service_id, *at);
            request.end_date = Some(*at + Duration::minutes(i64::from(series.duration_minutes)));
            request.notes = series.notes.clone();
            request.address = series.address.clone();

            match self
                .booking_service
                .create_with_origin(series.client_id, request, BookingOrigin::recurring(series.id))
                .await
            {
                Ok(details) => created.push(details.booking),
                Err(e) => tracing::warn!(series_id = %series.id, occurrence = %at, error = %e, "occurrence skipped"),
            }
        }
        created
    }

    async fn cancel_future_children(&self, series: &RecurringBooking, actor_id: Uuid, reason: &str) -> DomainResult<()> {
        let now = self.clock.now();
        let children = self.bookings.find_by_recurring(series.id).await?;

        for booking in children
            .into_iter()
            .filter(|b| b.booking_date > now && !b.status.is_terminal())
        {
            let booking_id = booking.id;
            if let Err(e) = self
                .booking_service
                .cancel_as(booking, actor_id, Some(reason.to_string()))
                .await
            {
                tracing::warn!(series_id = %series.id, %booking_id, error = %e, "series booking not cancelled");
            }
        }
        Ok(())
    }

    async fn load_owned(&self, actor_id: Uuid, series_id: Uuid) -> DomainResult<RecurringBooking> {
        let series = self
            .repo
            .find_by_id(series_id)
            .await?
            .ok_or_else(|| DomainError::not_found("RecurringBooking", series_id))?;

        if !series.involves(actor_id) {
            return Err(DomainError::Forbidden(
                "You do not have permission to access this recurring booking".to_string(),
            ));
        }
        Ok(series)
    }

    async fn move_to(
        &self,
        series: &RecurringBooking,
        expected: &[RecurringStatus],
        to: RecurringStatus,
    ) -> DomainResult<RecurringBooking> {
        if !expected.contains(&series.status) {
            return Err(DomainError::InvalidState(format!(
                "Recurring booking is {} and cannot become {}",
                series.status, to
            )));
        }

        let updated = self
            .repo
            .update_status(series.id, expected, to, self.clock.now())
            .await?
            .ok_or_else(|| DomainError::InvalidState(format!("Recurring booking {} changed concurrently", series.id)))?;

        tracing::info!(series_id = %updated.id, from = %series.status, to = %updated.status, "recurring series transition");
        Ok(updated)
    }

    async fn details(&self, series: RecurringBooking) -> DomainResult<RecurringSeriesDetails> {
        let bookings = self.bookings.find_by_recurring(series.id).await?;
        Ok(RecurringSeriesDetails { series, bookings })
    }
}
