use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::{BookingService, CreateBookingRequest};
use crate::catalog::CatalogRepository;
use crate::clock::Clock;
use crate::effects::PostCommit;
use crate::error::{DomainError, DomainResult};
use crate::notifications::{Channel, Notification, NotificationDispatcher};
use crate::waitlist::{
    ConvertWaitlistRequest, JoinWaitlistRequest, NotifyWaitlistRequest, WaitlistConversion, WaitlistEntry, WaitlistJoin,
    WaitlistMatcher, WaitlistRepository, WaitlistStatus,
};

const JOIN_CHANNELS: &[Channel] = &[Channel::InApp, Channel::Email];

/// Client and provider facing waitlist operations
#[derive(Clone)]
pub struct WaitlistService {
    repo: Arc<dyn WaitlistRepository>,
    catalog: Arc<dyn CatalogRepository>,
    booking_service: Arc<BookingService>,
    matcher: Arc<WaitlistMatcher>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl WaitlistService {
    pub fn new(
        repo: Arc<dyn WaitlistRepository>,
        catalog: Arc<dyn CatalogRepository>,
        booking_service: Arc<BookingService>,
        matcher: Arc<WaitlistMatcher>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            catalog,
            booking_service,
            matcher,
            dispatcher,
            clock,
        }
    }

    /// Put the client on the waitlist of a service
    ///
    /// A previous booked or cancelled entry is reused; a live one is a conflict.
    pub async fn join(&self, client_id: Uuid, request: JoinWaitlistRequest) -> DomainResult<WaitlistEntry> {
        tracing::debug!(%client_id, service_id = %request.service_id, "joining waitlist");
        request.validate()?;

        let service = self
            .catalog
            .find_service(request.service_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Service", request.service_id))?;

        if !service.is_active() {
            return Err(DomainError::InvalidState("Service is not accepting bookings".to_string()));
        }
        if service.provider_id == client_id {
            return Err(DomainError::Forbidden(
                "Providers cannot join the waitlist of their own services".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut alternative_dates: Vec<_> = request.alternative_dates.iter().map(|d| d.date_naive()).collect();
        alternative_dates.sort_unstable();
        alternative_dates.dedup();

        let join = WaitlistJoin {
            preferred_date: request.preferred_date.date_naive(),
            preferred_time: request.preferred_time,
            alternative_dates,
            priority: request.priority.unwrap_or(0),
            notes: request.notes,
            at: now,
        };

        let entry = match self.repo.find_for_client_service(service.id, client_id).await? {
            Some(existing) if !existing.status.is_terminal() => {
                return Err(DomainError::Conflict("Already on the waitlist for this service".to_string()));
            }
            Some(existing) => self
                .repo
                .rejoin(existing.id, &join)
                .await?
                .ok_or_else(|| DomainError::Conflict("Waitlist entry changed concurrently".to_string()))?,
            None => {
                self.repo
                    .insert(&WaitlistEntry {
                        id: Uuid::new_v4(),
                        service_id: service.id,
                        client_id,
                        provider_id: service.provider_id,
                        preferred_date: join.preferred_date,
                        preferred_time: join.preferred_time,
                        alternative_dates: join.alternative_dates.clone(),
                        priority: join.priority,
                        status: WaitlistStatus::Active,
                        notes: join.notes.clone(),
                        notified_at: None,
                        expires_at: None,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?
            }
        };

        tracing::info!(entry_id = %entry.id, service_id = %entry.service_id, %client_id, "joined waitlist");

        let joined = Notification::waitlist_joined(entry.id, &service.name, entry.preferred_date);
        PostCommit::new("join_waitlist")
            .then("notify_provider", async {
                self.dispatcher
                    .notify(service.provider_id, joined, JOIN_CHANNELS)
                    .await
                    .map(|_| ())
            })
            .run()
            .await;

        Ok(entry)
    }

    /// Client withdraws their own live entry
    pub async fn leave(&self, client_id: Uuid, entry_id: Uuid) -> DomainResult<WaitlistEntry> {
        let entry = self.load(entry_id).await?;
        if entry.client_id != client_id {
            return Err(DomainError::Forbidden("This waitlist entry belongs to another client".to_string()));
        }

        let entry = self
            .repo
            .cancel(entry.id, self.clock.now())
            .await?
            .ok_or_else(|| DomainError::InvalidState("Waitlist entry is no longer active".to_string()))?;

        tracing::info!(entry_id = %entry.id, "left waitlist");
        Ok(entry)
    }

    /// Provider offers a spot to an active entry
    pub async fn notify(
        &self,
        actor_id: Uuid,
        entry_id: Uuid,
        request: NotifyWaitlistRequest,
    ) -> DomainResult<WaitlistEntry> {
        request.validate()?;
        self.matcher.notify(actor_id, entry_id, request.expires_in_hours).await
    }

    /// Turn an open offer into a pending booking
    ///
    /// The entry is claimed first so an offer converts at most once; if the
    /// booking cannot be created the claim is undone.
    pub async fn convert(
        &self,
        client_id: Uuid,
        entry_id: Uuid,
        request: ConvertWaitlistRequest,
    ) -> DomainResult<WaitlistConversion> {
        request.validate()?;
        let entry = self.load(entry_id).await?;
        if entry.client_id != client_id {
            return Err(DomainError::Forbidden("This waitlist entry belongs to another client".to_string()));
        }
        if entry.status != WaitlistStatus::Notified {
            return Err(DomainError::InvalidState(format!(
                "Waitlist entry is {:?}, only notified entries can be booked",
                entry.status
            )));
        }

        let now = self.clock.now();
        if entry.expires_at.map_or(true, |expires_at| now >= expires_at) {
            return Err(DomainError::Validation("Waitlist offer has expired".to_string()));
        }

        let claimed = self
            .repo
            .claim_for_booking(entry.id, now)
            .await?
            .ok_or_else(|| DomainError::Validation("Waitlist offer has expired".to_string()))?;

        let mut booking_request = CreateBookingRequest::new(claimed.service_id, request.booking_date);
        booking_request.end_date = request.end_date;
        booking_request.address = request.address;
        booking_request.notes = claimed.notes.clone();

        match self.booking_service.create_booking(client_id, booking_request).await {
            Ok(booking) => {
                tracing::info!(entry_id = %claimed.id, booking_id = %booking.booking.id, "waitlist entry converted");
                Ok(WaitlistConversion { entry: claimed, booking })
            }
            Err(e) => {
                if let Err(restore) = self.repo.restore_notified(claimed.id).await {
                    tracing::error!(entry_id = %claimed.id, error = %restore, "waitlist claim not restored");
                }
                Err(e)
            }
        }
    }

    pub async fn list_mine(&self, client_id: Uuid) -> DomainResult<Vec<WaitlistEntry>> {
        self.repo.find_for_client(client_id).await
    }

    /// Live entries of a service, for its provider
    pub async fn list_for_service(&self, actor_id: Uuid, service_id: Uuid) -> DomainResult<Vec<WaitlistEntry>> {
        let service = self
            .catalog
            .find_service(service_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Service", service_id))?;

        if service.provider_id != actor_id {
            return Err(DomainError::Forbidden(
                "Only the service provider can see its waitlist".to_string(),
            ));
        }
        self.repo.find_active_for_service(service_id).await
    }

    async fn load(&self, entry_id: Uuid) -> DomainResult<WaitlistEntry> {
        self.repo
            .find_by_id(entry_id)
            .await?
            .ok_or_else(|| DomainError::not_found("WaitlistEntry", entry_id))
    }
}
