use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::{Booking, BookingOrigin, BookingRepository, BookingService, CreateBookingRequest, PriceCalculator};
use crate::catalog::CatalogRepository;
use crate::clock::Clock;
use crate::effects::PostCommit;
use crate::error::{DomainError, DomainResult};
use crate::groups::{
    active_members, CancelGroupRequest, CreateGroupRequest, GroupBooking, GroupDetails, GroupRepository, GroupStatus,
};
use crate::notifications::{Notification, NotificationDispatcher, BOOKING_CHANNELS};

const LEAVE_REASON: &str = "left group";
const CANCEL_REASON_PREFIX: &str = "Group booking cancelled";

/// Group booking coordinator
///
/// Every participant holds one member booking tagged with the group id. The
/// seat limit is enforced when that booking is inserted.
#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn GroupRepository>,
    bookings: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogRepository>,
    booking_service: Arc<BookingService>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl GroupService {
    pub fn new(
        repo: Arc<dyn GroupRepository>,
        bookings: Arc<dyn BookingRepository>,
        catalog: Arc<dyn CatalogRepository>,
        booking_service: Arc<BookingService>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            bookings,
            catalog,
            booking_service,
            dispatcher,
            clock,
        }
    }

    /// Open a group and enroll the organizer
    ///
    /// The group row is removed again if the organizer's booking cannot be
    /// created.
    pub async fn create(&self, organizer_id: Uuid, request: CreateGroupRequest) -> DomainResult<GroupDetails> {
        tracing::debug!(%organizer_id, service_id = %request.service_id, "creating group booking");
        request.validate()?;

        let service = self
            .catalog
            .find_service(request.service_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Service", request.service_id))?;

        if !service.is_active() {
            return Err(DomainError::InvalidState("Service is not accepting bookings".to_string()));
        }

        let settings = self
            .catalog
            .find_group_settings(service.id)
            .await?
            .filter(|settings| settings.enabled)
            .ok_or_else(|| DomainError::Validation("Group bookings are not enabled for this service".to_string()))?;

        if request.max_participants > settings.max_participants {
            return Err(DomainError::Validation(format!(
                "This service allows at most {} participants per group",
                settings.max_participants
            )));
        }
        if let Some(cap) = service.max_bookings {
            if request.max_participants > cap {
                return Err(DomainError::Validation(format!(
                    "This service takes at most {} bookings per day, a group cannot exceed that",
                    cap
                )));
            }
        }
        PriceCalculator::validate_discount(settings.group_discount)?;
        let min_participants = request.min_participants.unwrap_or(settings.min_participants).max(1);
        if min_participants > request.max_participants {
            return Err(DomainError::Validation(
                "Minimum participants cannot exceed the maximum".to_string(),
            ));
        }
        if let Some(end) = request.end_date {
            if end <= request.booking_date {
                return Err(DomainError::Validation("End date must be after the start date".to_string()));
            }
        }

        let now = self.clock.now();
        let group = self
            .repo
            .insert(&GroupBooking {
                id: Uuid::new_v4(),
                service_id: service.id,
                organizer_id,
                provider_id: service.provider_id,
                name: request.name,
                description: request.description,
                max_participants: request.max_participants,
                min_participants,
                price_per_person: PriceCalculator::apply_discount(service.price, settings.group_discount),
                booking_date: request.booking_date,
                end_date: request.end_date,
                status: GroupStatus::Open,
                created_at: now,
                updated_at: now,
            })
            .await?;

        if let Err(e) = self.enroll(&group, organizer_id, request.address).await {
            tracing::warn!(group_id = %group.id, error = %e, "organizer booking failed, removing group");
            if let Err(cleanup) = self.repo.delete(group.id).await {
                tracing::error!(group_id = %group.id, error = %cleanup, "orphaned group booking not removed");
            }
            return Err(e);
        }

        tracing::info!(group_id = %group.id, max = group.max_participants, "group booking created");
        let group = self.after_join(group).await?;
        self.details(organizer_id, group).await
    }

    /// Take a seat in an open group
    pub async fn join(&self, client_id: Uuid, group_id: Uuid) -> DomainResult<GroupDetails> {
        let group = self.load(group_id).await?;
        group.status.ensure_accepting()?;

        let members = active_members(self.bookings.find_by_group(group.id).await?);
        if members.iter().any(|b| b.client_id == client_id) {
            return Err(DomainError::Conflict("Already a participant of this group".to_string()));
        }
        if members.len() as i64 >= i64::from(group.max_participants) {
            return Err(DomainError::Conflict("Group booking is full".to_string()));
        }

        self.enroll(&group, client_id, None).await?;
        tracing::info!(%group_id, %client_id, "participant joined group");

        let group = self.after_join(group).await?;
        self.details(client_id, group).await
    }

    /// Give up a seat; the organizer cannot leave their own group
    pub async fn leave(&self, client_id: Uuid, group_id: Uuid) -> DomainResult<GroupDetails> {
        let group = self.load(group_id).await?;
        if group.organizer_id == client_id {
            return Err(DomainError::Forbidden(
                "The organizer cannot leave the group, cancel it instead".to_string(),
            ));
        }

        let membership = active_members(self.bookings.find_by_group(group.id).await?)
            .into_iter()
            .find(|b| b.client_id == client_id)
            .ok_or_else(|| DomainError::not_found("GroupMembership", group_id))?;

        self.booking_service
            .cancel_as(membership, client_id, Some(LEAVE_REASON.to_string()))
            .await?;
        tracing::info!(%group_id, %client_id, "participant left group");

        let group = if group.status == GroupStatus::Confirmed {
            self.repo
                .update_status(group.id, &[GroupStatus::Confirmed], GroupStatus::Open, self.clock.now())
                .await?
                .unwrap_or(group)
        } else {
            group
        };

        let remaining = active_members(self.bookings.find_by_group(group.id).await?);
        let count = remaining.len() as i64;
        if count < i64::from(group.min_participants) {
            let shortfall = Notification::group_below_minimum(group.id, &group.name, count, group.min_participants);
            self.notify_members("notify_below_minimum", &remaining, shortfall).await;
        }

        self.details(client_id, group).await
    }

    /// Organizer cancels the group and every member booking with it
    pub async fn cancel(
        &self,
        actor_id: Uuid,
        group_id: Uuid,
        request: CancelGroupRequest,
    ) -> DomainResult<GroupDetails> {
        request.validate()?;
        let group = self.load(group_id).await?;
        if group.organizer_id != actor_id {
            return Err(DomainError::Forbidden("Only the organizer can cancel this group".to_string()));
        }
        if group.status == GroupStatus::Cancelled {
            return Err(DomainError::InvalidState("Group booking is already cancelled".to_string()));
        }

        let group = self
            .repo
            .update_status(
                group.id,
                &[GroupStatus::Open, GroupStatus::Confirmed],
                GroupStatus::Cancelled,
                self.clock.now(),
            )
            .await?
            .ok_or_else(|| DomainError::InvalidState(format!("Group booking {} changed concurrently", group.id)))?;

        tracing::info!(%group_id, "group booking cancelled");

        let reason = match request.reason.as_deref() {
            Some(reason) => format!("{}: {}", CANCEL_REASON_PREFIX, reason),
            None => CANCEL_REASON_PREFIX.to_string(),
        };

        let members = self.bookings.find_by_group(group.id).await?;
        let mut notified = Vec::new();
        for booking in members.into_iter().filter(|b| !b.status.is_terminal()) {
            let booking_id = booking.id;
            match self
                .booking_service
                .cancel_as(booking, actor_id, Some(reason.clone()))
                .await
            {
                Ok(cancelled) => notified.push(cancelled),
                Err(e) => tracing::warn!(%group_id, %booking_id, error = %e, "member booking not cancelled"),
            }
        }

        let cancelled = Notification::group_cancelled(group.id, &group.name, request.reason.as_deref());
        self.notify_members("notify_group_cancelled", &notified, cancelled).await;

        self.details(actor_id, group).await
    }

    pub async fn get(&self, actor_id: Uuid, group_id: Uuid) -> DomainResult<GroupDetails> {
        let group = self.load(group_id).await?;
        self.details(actor_id, group).await
    }

    async fn enroll(&self, group: &GroupBooking, client_id: Uuid, address: Option<String>) -> DomainResult<Booking> {
        let mut request = CreateBookingRequest::new(group.service_id, group.booking_date);
        request.end_date = group.end_date;
        request.address = address;

        let origin = BookingOrigin::group(group.id, group.max_participants, group.price_per_person);
        let details = self
            .booking_service
            .create_with_origin(client_id, request, origin)
            .await?;
        Ok(details.booking)
    }

    /// Minimum-reached and confirmation handling after a seat was taken
    async fn after_join(&self, group: GroupBooking) -> DomainResult<GroupBooking> {
        let members = active_members(self.bookings.find_by_group(group.id).await?);
        let count = members.len() as i64;

        let mut group = group;
        if count >= i64::from(group.max_participants) {
            if let Some(confirmed) = self
                .repo
                .update_status(group.id, &[GroupStatus::Open], GroupStatus::Confirmed, self.clock.now())
                .await?
            {
                tracing::info!(group_id = %confirmed.id, participants = count, "group booking confirmed");
                group = confirmed;
                let notification = Notification::group_confirmed(group.id, &group.name, group.booking_date);
                self.notify_members("notify_group_confirmed", &members, notification).await;
            }
        }

        if count == i64::from(group.min_participants) {
            let reached = Notification::group_minimum_reached(group.id, &group.name, count);
            PostCommit::new("group_join")
                .then("notify_organizer", self.notify(group.organizer_id, reached))
                .run()
                .await;
        }

        Ok(group)
    }

    async fn notify_members(&self, effect: &'static str, members: &[Booking], notification: Notification) {
        let mut effects = PostCommit::new("group_members");
        for member in members {
            effects = effects.then(effect, self.notify(member.client_id, notification.clone()));
        }
        effects.run().await;
    }

    async fn notify(&self, user_id: Uuid, notification: Notification) -> DomainResult<()> {
        self.dispatcher
            .notify(user_id, notification, BOOKING_CHANNELS)
            .await
            .map(|_| ())
    }

    async fn load(&self, group_id: Uuid) -> DomainResult<GroupBooking> {
        self.repo
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| DomainError::not_found("GroupBooking", group_id))
    }

    /// Member list is only shown to participants and the owning provider
    async fn details(&self, actor_id: Uuid, group: GroupBooking) -> DomainResult<GroupDetails> {
        let members = active_members(self.bookings.find_by_group(group.id).await?);
        let can_see_members = group.provider_id == actor_id
            || group.organizer_id == actor_id
            || members.iter().any(|b| b.client_id == actor_id);

        Ok(GroupDetails {
            participant_count: members.len() as i64,
            members: can_see_members.then_some(members),
            group,
        })
    }
}
