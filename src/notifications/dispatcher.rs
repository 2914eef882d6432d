use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::{CatalogRepository, UserContact};
use crate::clock::Clock;
use crate::error::{DomainError, DomainResult};
use crate::notifications::{
    render, Channel, ChannelOutcome, DeliveryError, InAppNotification, Notification, NotificationRepository,
    Notifier, RealtimeEvent, RealtimePublisher, Recipient, RenderedNotification,
};

/// Default channel set for booking lifecycle notifications
pub const BOOKING_CHANNELS: &[Channel] = &[Channel::InApp, Channel::Email, Channel::Push];

/// Renders notifications and fans them out to the inbox, external channels
/// and live connections
#[derive(Clone)]
pub struct NotificationDispatcher {
    repo: Arc<dyn NotificationRepository>,
    catalog: Arc<dyn CatalogRepository>,
    notifier: Arc<dyn Notifier>,
    realtime: Arc<dyn RealtimePublisher>,
    clock: Arc<dyn Clock>,
}

fn channel_enabled(contact: &UserContact, channel: Channel) -> bool {
    match channel {
        Channel::Email => contact.email_enabled,
        Channel::Sms => contact.sms_enabled,
        Channel::Push => contact.push_enabled,
        Channel::InApp => true,
    }
}

fn has_address(contact: &UserContact, channel: Channel) -> bool {
    match channel {
        Channel::Email => contact.email.as_deref().is_some_and(|e| !e.is_empty()),
        Channel::Sms => contact.phone.as_deref().is_some_and(|p| !p.is_empty()),
        Channel::Push | Channel::InApp => true,
    }
}

impl NotificationDispatcher {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        catalog: Arc<dyn CatalogRepository>,
        notifier: Arc<dyn Notifier>,
        realtime: Arc<dyn RealtimePublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            catalog,
            notifier,
            realtime,
            clock,
        }
    }

    /// Send `notification` to `user_id` on every requested channel
    ///
    /// Only a failure to store the in-app row is returned as an error;
    /// external channel failures are logged and reported in the outcomes.
    pub async fn notify(
        &self,
        user_id: Uuid,
        notification: Notification,
        channels: &[Channel],
    ) -> DomainResult<Vec<ChannelOutcome>> {
        let rendered = render(&notification);
        let mut outcomes = Vec::with_capacity(channels.len());

        if channels.contains(&Channel::InApp) {
            self.store_in_app(user_id, &rendered).await?;
            outcomes.push(ChannelOutcome::delivered(Channel::InApp));
        }

        let external: Vec<Channel> = channels.iter().copied().filter(|c| *c != Channel::InApp).collect();
        if !external.is_empty() {
            match self.catalog.find_contact(user_id).await {
                Ok(Some(contact)) => {
                    let (allowed, opted_out): (Vec<Channel>, Vec<Channel>) =
                        external.into_iter().partition(|c| channel_enabled(&contact, *c));
                    outcomes.extend(
                        opted_out
                            .into_iter()
                            .map(|c| ChannelOutcome::failed(c, DeliveryError::OptedOut(c).to_string())),
                    );
                    if !allowed.is_empty() {
                        let sent = self
                            .notifier
                            .send(&rendered, &Recipient::from_contact(&contact), &allowed)
                            .await;
                        outcomes.extend(sent);
                    }
                }
                Ok(None) => outcomes.extend(external.into_iter().map(|c| {
                    ChannelOutcome::failed(c, DeliveryError::UnknownRecipient(user_id).to_string())
                })),
                Err(e) => {
                    let reason = e.to_string();
                    outcomes.extend(external.into_iter().map(|c| ChannelOutcome::failed(c, reason.clone())));
                }
            }
        }

        for outcome in outcomes.iter().filter(|o| !o.delivered) {
            tracing::warn!(
                %user_id,
                kind = %rendered.kind,
                channel = %outcome.channel,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "notification not delivered"
            );
        }

        self.publish(user_id, &rendered);
        Ok(outcomes)
    }

    /// Deliver on exactly one channel, failing when the recipient cannot be
    /// reached there (no contact details or opted out)
    pub async fn deliver(
        &self,
        user_id: Uuid,
        notification: &Notification,
        channel: Channel,
    ) -> Result<(), DeliveryError> {
        let rendered = render(notification);

        if channel == Channel::InApp {
            return self
                .store_in_app(user_id, &rendered)
                .await
                .map_err(|e| DeliveryError::Failed {
                    channel,
                    reason: e.to_string(),
                });
        }

        let contact = self
            .catalog
            .find_contact(user_id)
            .await
            .map_err(|e| DeliveryError::Failed {
                channel,
                reason: e.to_string(),
            })?
            .ok_or(DeliveryError::UnknownRecipient(user_id))?;

        if !channel_enabled(&contact, channel) {
            return Err(DeliveryError::OptedOut(channel));
        }
        if !has_address(&contact, channel) {
            return Err(DeliveryError::MissingContact(channel));
        }

        let outcome = self
            .notifier
            .send(&rendered, &Recipient::from_contact(&contact), &[channel])
            .await
            .into_iter()
            .next();

        match outcome {
            Some(outcome) if outcome.delivered => {
                self.publish(user_id, &rendered);
                Ok(())
            }
            Some(outcome) => Err(DeliveryError::Failed {
                channel,
                reason: outcome.error.unwrap_or_else(|| "rejected by channel".to_string()),
            }),
            None => Err(DeliveryError::Failed {
                channel,
                reason: "no delivery outcome".to_string(),
            }),
        }
    }

    /// A user's in-app inbox, newest first
    pub async fn inbox(&self, user_id: Uuid, unread_only: bool) -> DomainResult<Vec<InAppNotification>> {
        self.repo.find_for_user(user_id, unread_only).await
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> DomainResult<InAppNotification> {
        self.repo
            .mark_read(notification_id, user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Notification", notification_id))
    }

    async fn store_in_app(&self, user_id: Uuid, rendered: &RenderedNotification) -> DomainResult<()> {
        self.repo
            .insert(&InAppNotification {
                id: Uuid::new_v4(),
                user_id,
                kind: rendered.kind,
                title: rendered.title.clone(),
                body: rendered.body.clone(),
                data: rendered.data.clone(),
                read: false,
                created_at: self.clock.now(),
            })
            .await
    }

    fn publish(&self, user_id: Uuid, rendered: &RenderedNotification) {
        self.realtime.publish(RealtimeEvent {
            user_id,
            kind: rendered.kind,
            title: rendered.title.clone(),
            payload: rendered.data.clone(),
        });
    }
}
