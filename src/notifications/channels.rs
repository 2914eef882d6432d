use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::UserContact;
use crate::notifications::RenderedNotification;

/// Delivery channel of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::InApp => "in_app",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a notification is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    pub fn from_contact(contact: &UserContact) -> Self {
        Self {
            user_id: contact.id,
            name: Some(contact.name.clone()),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
        }
    }
}

/// Result of one channel delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub delivered: bool,
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn delivered(channel: Channel) -> Self {
        Self {
            channel,
            delivered: true,
            error: None,
        }
    }

    pub fn failed(channel: Channel, error: impl Into<String>) -> Self {
        Self {
            channel,
            delivered: false,
            error: Some(error.into()),
        }
    }
}

/// Why a targeted delivery did not happen
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("no contact record for user {0}")]
    UnknownRecipient(Uuid),

    #[error("recipient has no {0} contact on file")]
    MissingContact(Channel),

    #[error("recipient opted out of {0}")]
    OptedOut(Channel),

    #[error("{channel} delivery failed: {reason}")]
    Failed { channel: Channel, reason: String },
}

/// External delivery of rendered notifications (email, SMS, push)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        notification: &RenderedNotification,
        recipient: &Recipient,
        channels: &[Channel],
    ) -> Vec<ChannelOutcome>;
}

/// Notifier that writes every delivery to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        notification: &RenderedNotification,
        recipient: &Recipient,
        channels: &[Channel],
    ) -> Vec<ChannelOutcome> {
        channels
            .iter()
            .map(|&channel| {
                let address = match channel {
                    Channel::Email => recipient.email.as_deref(),
                    Channel::Sms => recipient.phone.as_deref(),
                    Channel::Push | Channel::InApp => Some(""),
                };
                match address {
                    Some(address) => {
                        tracing::info!(
                            user_id = %recipient.user_id,
                            %channel,
                            address,
                            kind = %notification.kind,
                            "{}",
                            notification.title
                        );
                        ChannelOutcome::delivered(channel)
                    }
                    None => ChannelOutcome::failed(channel, DeliveryError::MissingContact(channel).to_string()),
                }
            })
            .collect()
    }
}
