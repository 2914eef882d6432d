use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::{
    Booking, BookingDetails, BookingListQuery, BookingOrigin, BookingRepository, BookingStatus, CapacityGuard,
    CreateBookingRequest, CreateGuards, FeeBreakdown, GroupSeat, NewBooking, PriceCalculator, PricingInput,
    StatusMachine, TransitionChange, UpdateStatusRequest, Window,
};
use crate::catalog::{CatalogRepository, Service};
use crate::clock::Clock;
use crate::effects::PostCommit;
use crate::error::{DomainError, DomainResult};
use crate::notifications::{Notification, NotificationDispatcher, BOOKING_CHANNELS};
use crate::reminders::ReminderScheduler;
use crate::waitlist::WaitlistMatcher;

/// Slot length assumed when neither the booking nor the service has one
const DEFAULT_SLOT_MINUTES: i64 = 60;

/// Service for booking business logic
///
/// Every transition commits first; notifications, reminders, buffer slots and
/// the waitlist check run afterwards as independent post-commit effects.
#[derive(Clone)]
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    reminders: Arc<ReminderScheduler>,
    waitlist: Arc<WaitlistMatcher>,
    clock: Arc<dyn Clock>,
}

fn slot_minutes(service: &Service) -> i64 {
    service
        .duration_minutes
        .map(i64::from)
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_SLOT_MINUTES)
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        catalog: Arc<dyn CatalogRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        reminders: Arc<ReminderScheduler>,
        waitlist: Arc<WaitlistMatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            catalog,
            dispatcher,
            reminders,
            waitlist,
            clock,
        }
    }

    /// Create a new booking for `client_id`
    ///
    /// # Validation
    /// - Service must exist and be active
    /// - A provider cannot book their own service
    /// - `end_date`, when given, must be after `booking_date`
    /// - Bundle must contain the service, add-ons must be active and belong to it
    /// - Per-day cap and buffer windows are enforced when the row is inserted
    pub async fn create_booking(&self, client_id: Uuid, request: CreateBookingRequest) -> DomainResult<BookingDetails> {
        self.create_with_origin(client_id, request, BookingOrigin::default()).await
    }

    /// Core creation routine shared with recurring series, groups and the waitlist
    pub async fn create_with_origin(
        &self,
        client_id: Uuid,
        request: CreateBookingRequest,
        origin: BookingOrigin,
    ) -> DomainResult<BookingDetails> {
        tracing::debug!(%client_id, service_id = %request.service_id, "creating booking");
        request.validate()?;

        if let Some(end) = request.end_date {
            if end <= request.booking_date {
                return Err(DomainError::Validation("End date must be after the start date".to_string()));
            }
        }

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

        let total_price = self.price_booking(&service, &request, &origin).await?;

        let slot = Window::new(
            request.booking_date,
            request
                .end_date
                .unwrap_or_else(|| request.booking_date + chrono::Duration::minutes(slot_minutes(&service))),
        );
        let guards = CreateGuards {
            max_per_day: service.max_bookings,
            group: origin.group_booking_id.zip(origin.group_max_participants).map(
                |(group_booking_id, max_participants)| GroupSeat {
                    group_booking_id,
                    max_participants,
                },
            ),
            buffer_check: Some(slot),
        };

        let new_booking = NewBooking {
            id: Uuid::new_v4(),
            service_id: service.id,
            client_id,
            provider_id: service.provider_id,
            booking_date: request.booking_date,
            end_date: request.end_date,
            total_price,
            notes: request.notes,
            address: request.address,
            recurring_booking_id: origin.recurring_booking_id,
            group_booking_id: origin.group_booking_id,
            created_at: self.clock.now(),
        };

        let (booking, payment) = self
            .bookings
            .create(new_booking, FeeBreakdown::for_amount(total_price), &guards)
            .await?;

        tracing::info!(
            booking_id = %booking.id,
            service_id = %booking.service_id,
            total_price = %booking.total_price,
            "booking created"
        );

        let buffer_slots =
            CapacityGuard::buffer_slots(&booking, service.buffer_minutes(), slot_minutes(&service), self.clock.now());
        let requested = Notification::booking_requested(&booking, &service.name);

        let mut effects = PostCommit::new("create_booking").then(
            "notify_provider",
            self.notify(booking.provider_id, requested),
        );
        if !buffer_slots.is_empty() {
            effects = effects.then("block_buffer_time", self.bookings.insert_time_slots(&buffer_slots));
        }
        effects.run().await;

        Ok(BookingDetails {
            booking,
            payment: Some(payment),
        })
    }

    /// Provider accepts a pending booking
    pub async fn accept_booking(&self, actor_id: Uuid, booking_id: Uuid) -> DomainResult<Booking> {
        let booking = self.load(booking_id).await?;
        Self::require_provider(&booking, actor_id)?;

        let change = TransitionChange::new(booking.status, BookingStatus::Accepted, self.clock.now());
        let booking = self.apply(&booking, change).await?;
        let service_name = self.service_name(booking.service_id).await;

        PostCommit::new("accept_booking")
            .then(
                "notify_client",
                self.notify(booking.client_id, Notification::booking_accepted(&booking, &service_name)),
            )
            .then("schedule_reminders", async {
                self.reminders.schedule_for_booking(&booking).await.map(|_| ())
            })
            .run()
            .await;

        Ok(booking)
    }

    /// Provider declines a pending booking
    pub async fn decline_booking(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<Booking> {
        let booking = self.load(booking_id).await?;
        Self::require_provider(&booking, actor_id)?;

        let change = TransitionChange::new(booking.status, BookingStatus::Declined, self.clock.now())
            .withdrawn_by(actor_id, reason.clone());
        let booking = self.apply(&booking, change).await?;
        let service_name = self.service_name(booking.service_id).await;

        PostCommit::new("decline_booking")
            .then(
                "notify_client",
                self.notify(
                    booking.client_id,
                    Notification::booking_declined(&booking, &service_name, reason.as_deref()),
                ),
            )
            .then("cancel_reminders", async {
                self.reminders.cancel_for_booking(booking.id).await.map(|_| ())
            })
            .run()
            .await;

        Ok(booking)
    }

    /// Provider marks an accepted booking as completed
    pub async fn complete_booking(&self, actor_id: Uuid, booking_id: Uuid) -> DomainResult<Booking> {
        let booking = self.load(booking_id).await?;
        Self::require_provider(&booking, actor_id)?;

        let change = TransitionChange::new(booking.status, BookingStatus::Completed, self.clock.now());
        let booking = self.apply(&booking, change).await?;
        let service_name = self.service_name(booking.service_id).await;

        PostCommit::new("complete_booking")
            .then(
                "notify_client",
                self.notify(booking.client_id, Notification::booking_completed(&booking, &service_name)),
            )
            .run()
            .await;

        Ok(booking)
    }

    /// Client or provider cancels a pending or accepted booking
    pub async fn cancel_booking(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<Booking> {
        let booking = self.load(booking_id).await?;
        if !booking.involves(actor_id) {
            return Err(DomainError::Forbidden(
                "Only the client or the provider can cancel this booking".to_string(),
            ));
        }
        self.cancel_as(booking, actor_id, reason).await
    }

    /// Cancel on behalf of a series owner or group organizer
    ///
    /// Callers are responsible for having authorized `actor_id`.
    pub(crate) async fn cancel_as(
        &self,
        booking: Booking,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<Booking> {
        let change = TransitionChange::new(booking.status, BookingStatus::Cancelled, self.clock.now())
            .withdrawn_by(actor_id, reason.clone());
        let booking = self.apply(&booking, change).await?;
        let service_name = self.service_name(booking.service_id).await;

        let notify_party = |user_id: Uuid| {
            self.notify(
                user_id,
                Notification::booking_cancelled(&booking, &service_name, reason.as_deref()),
            )
        };

        let mut effects = PostCommit::new("cancel_booking");
        if actor_id != booking.client_id {
            effects = effects.then("notify_client", notify_party(booking.client_id));
        }
        if actor_id != booking.provider_id {
            effects = effects.then("notify_provider", notify_party(booking.provider_id));
        }
        effects
            .then("cancel_reminders", async {
                self.reminders.cancel_for_booking(booking.id).await.map(|_| ())
            })
            .then("waitlist_opportunity", async {
                self.waitlist
                    .on_cancellation(booking.service_id, booking.day())
                    .await
                    .map(|_| ())
            })
            .run()
            .await;

        Ok(booking)
    }

    /// Generic status update routed to the dedicated transition
    pub async fn update_status(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        request: UpdateStatusRequest,
    ) -> DomainResult<Booking> {
        request.validate()?;
        match request.status {
            BookingStatus::Accepted => self.accept_booking(actor_id, booking_id).await,
            BookingStatus::Declined => self.decline_booking(actor_id, booking_id, request.reason).await,
            BookingStatus::Completed => self.complete_booking(actor_id, booking_id).await,
            BookingStatus::Cancelled => self.cancel_booking(actor_id, booking_id, request.reason).await,
            BookingStatus::Pending => Err(DomainError::InvalidState(
                "A booking cannot be moved back to pending".to_string(),
            )),
        }
    }

    /// A booking and its payment, visible to its two parties only
    pub async fn get_booking(&self, actor_id: Uuid, booking_id: Uuid) -> DomainResult<BookingDetails> {
        let booking = self.load(booking_id).await?;
        if !booking.involves(actor_id) {
            return Err(DomainError::Forbidden(
                "You do not have permission to access this booking".to_string(),
            ));
        }
        let payment = self.bookings.find_payment(booking.id).await?;
        Ok(BookingDetails { booking, payment })
    }

    pub async fn list_bookings(&self, actor_id: Uuid, query: BookingListQuery) -> DomainResult<Vec<Booking>> {
        self.bookings.find_for_user(actor_id, query.role, query.status).await
    }

    async fn price_booking(
        &self,
        service: &Service,
        request: &CreateBookingRequest,
        origin: &BookingOrigin,
    ) -> DomainResult<rust_decimal::Decimal> {
        let add_on_ids: Vec<Uuid> = request
            .add_on_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let add_ons = self.catalog.find_add_ons(service.id, &add_on_ids).await?;
        if add_ons.len() != add_on_ids.len() || add_ons.iter().any(|a| !a.active) {
            return Err(DomainError::Validation(
                "Add-ons must be active and belong to the booked service".to_string(),
            ));
        }

        if let Some(price) = origin.price_override {
            if price < rust_decimal::Decimal::ZERO {
                return Err(DomainError::Validation("Price cannot be negative".to_string()));
            }
            return Ok(price + PriceCalculator::add_ons_total(&add_ons));
        }

        let bundle_discount = match request.bundle_id {
            None => None,
            Some(bundle_id) => {
                let bundle = self
                    .catalog
                    .find_bundle_for_service(bundle_id, service.id)
                    .await?
                    .filter(|bundle| bundle.active)
                    .ok_or_else(|| {
                        DomainError::Validation("Bundle is not available for this service".to_string())
                    })?;
                Some(bundle.discount_percent)
            }
        };

        PriceCalculator::calculate_total(&PricingInput {
            price: service.price,
            price_type: service.price_type,
            start: request.booking_date,
            end: request.end_date,
            bundle_discount,
            add_ons: &add_ons,
        })
    }

    async fn load(&self, booking_id: Uuid) -> DomainResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", booking_id))
    }

    fn require_provider(booking: &Booking, actor_id: Uuid) -> DomainResult<()> {
        if booking.provider_id != actor_id {
            return Err(DomainError::Forbidden(
                "Only the provider of this booking can do that".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and write a transition guarded on the current status
    async fn apply(&self, booking: &Booking, change: TransitionChange) -> DomainResult<Booking> {
        StatusMachine::transition(booking.status, change.to)?;
        let to = change.to;

        let updated = self.bookings.transition(booking.id, &change).await?.ok_or_else(|| {
            DomainError::InvalidState(format!("Booking {} changed while moving it to {}", booking.id, to))
        })?;

        tracing::info!(booking_id = %updated.id, from = %booking.status, to = %updated.status, "booking transition");
        Ok(updated)
    }

    async fn service_name(&self, service_id: Uuid) -> String {
        match self.catalog.find_service(service_id).await {
            Ok(Some(service)) => service.name,
            Ok(None) => "your service".to_string(),
            Err(e) => {
                tracing::warn!(%service_id, error = %e, "service lookup failed while notifying");
                "your service".to_string()
            }
        }
    }

    async fn notify(&self, user_id: Uuid, notification: Notification) -> DomainResult<()> {
        self.dispatcher
            .notify(user_id, notification, BOOKING_CHANNELS)
            .await
            .map(|_| ())
    }
}
