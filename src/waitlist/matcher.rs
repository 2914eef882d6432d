use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::CatalogRepository;
use crate::clock::Clock;
use crate::error::{DomainError, DomainResult};
use crate::notifications::{Channel, Notification, NotificationDispatcher};
use crate::waitlist::{WaitlistEntry, WaitlistRepository, WaitlistStatus, OPPORTUNITY_BATCH};

const OFFER_CHANNELS: &[Channel] = &[Channel::InApp, Channel::Email, Channel::Sms];

/// Matches freed slots to waiting clients and manages offer expiry
#[derive(Clone)]
pub struct WaitlistMatcher {
    repo: Arc<dyn WaitlistRepository>,
    catalog: Arc<dyn CatalogRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    default_offer_hours: i64,
}

impl WaitlistMatcher {
    pub fn new(
        repo: Arc<dyn WaitlistRepository>,
        catalog: Arc<dyn CatalogRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        default_offer_hours: i64,
    ) -> Self {
        Self {
            repo,
            catalog,
            dispatcher,
            clock,
            default_offer_hours,
        }
    }

    /// Opportunity check after a booking of `service_id` on `day` was cancelled
    ///
    /// Notifies up to five matching active entries on behalf of the provider
    /// and returns how many were notified.
    pub async fn on_cancellation(&self, service_id: Uuid, day: NaiveDate) -> DomainResult<usize> {
        let service = self
            .catalog
            .find_service(service_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Service", service_id))?;

        let matches = self.repo.find_matching(service_id, day, OPPORTUNITY_BATCH).await?;
        tracing::debug!(%service_id, %day, candidates = matches.len(), "waitlist opportunity check");

        let mut notified = 0;
        for entry in matches {
            match self.notify(service.provider_id, entry.id, None).await {
                Ok(_) => notified += 1,
                Err(e) => tracing::warn!(entry_id = %entry.id, error = %e, "waitlist entry not notified"),
            }
        }
        Ok(notified)
    }

    /// Offer a spot to an active entry
    ///
    /// Only the service's provider may do this. The entry is marked notified
    /// even when the message cannot be delivered.
    pub async fn notify(
        &self,
        actor_id: Uuid,
        entry_id: Uuid,
        expires_in_hours: Option<i64>,
    ) -> DomainResult<WaitlistEntry> {
        let entry = self
            .repo
            .find_by_id(entry_id)
            .await?
            .ok_or_else(|| DomainError::not_found("WaitlistEntry", entry_id))?;

        let service = self
            .catalog
            .find_service(entry.service_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Service", entry.service_id))?;

        if service.provider_id != actor_id {
            return Err(DomainError::Forbidden(
                "Only the service provider can notify waitlisted clients".to_string(),
            ));
        }
        if entry.status != WaitlistStatus::Active {
            return Err(DomainError::InvalidState(format!(
                "Waitlist entry is {:?}, only active entries can be notified",
                entry.status
            )));
        }

        let hours = expires_in_hours.unwrap_or(self.default_offer_hours);
        if hours <= 0 {
            return Err(DomainError::Validation("Offer window must be positive".to_string()));
        }

        let now = self.clock.now();
        let expires_at = now + Duration::hours(hours);
        let entry = self
            .repo
            .mark_notified(entry.id, now, expires_at)
            .await?
            .ok_or_else(|| DomainError::InvalidState("Waitlist entry changed concurrently".to_string()))?;

        tracing::info!(entry_id = %entry.id, client_id = %entry.client_id, %expires_at, "waitlist entry notified");

        let offer = Notification::waitlist_spot_available(entry.id, &service.name, entry.preferred_date, expires_at);
        if let Err(e) = self.dispatcher.notify(entry.client_id, offer, OFFER_CHANNELS).await {
            tracing::warn!(entry_id = %entry.id, error = %e, "waitlist offer not delivered");
        }

        Ok(entry)
    }

    /// Expiry sweep: notified entries past their offer window become active
    pub async fn expire_offers(&self) -> DomainResult<u64> {
        let reverted = self.repo.revert_expired(self.clock.now()).await?;
        if reverted > 0 {
            tracing::info!(reverted, "expired waitlist offers reverted to active");
        }
        Ok(reverted)
    }
}
