// Typed notification templates
//
// Every kind owns a fixed title/body with `{{var}}` placeholders. The only way
// to build a `Notification` is through the constructor of its kind, which
// takes exactly the variables that kind's template uses.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::bookings::Booking;

/// Closed set of notifications the marketplace sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequested,
    BookingAccepted,
    BookingDeclined,
    BookingCompleted,
    BookingCancelled,
    GroupMinimumReached,
    GroupConfirmed,
    GroupBelowMinimum,
    GroupCancelled,
    WaitlistJoined,
    WaitlistSpotAvailable,
    BookingReminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingRequested => "booking_requested",
            NotificationKind::BookingAccepted => "booking_accepted",
            NotificationKind::BookingDeclined => "booking_declined",
            NotificationKind::BookingCompleted => "booking_completed",
            NotificationKind::BookingCancelled => "booking_cancelled",
            NotificationKind::GroupMinimumReached => "group_minimum_reached",
            NotificationKind::GroupConfirmed => "group_confirmed",
            NotificationKind::GroupBelowMinimum => "group_below_minimum",
            NotificationKind::GroupCancelled => "group_cancelled",
            NotificationKind::WaitlistJoined => "waitlist_joined",
            NotificationKind::WaitlistSpotAvailable => "waitlist_spot_available",
            NotificationKind::BookingReminder => "booking_reminder",
        }
    }

    /// Title and body templates
    fn template(&self) -> (&'static str, &'static str) {
        match self {
            NotificationKind::BookingRequested => (
                "New booking request",
                "You have a new request for {{service_name}} on {{booking_date}}.",
            ),
            NotificationKind::BookingAccepted => (
                "Booking accepted",
                "Your booking for {{service_name}} on {{booking_date}} was accepted.",
            ),
            NotificationKind::BookingDeclined => (
                "Booking declined",
                "Your booking for {{service_name}} on {{booking_date}} was declined. Reason: {{reason}}",
            ),
            NotificationKind::BookingCompleted => (
                "Booking completed",
                "Your booking for {{service_name}} is complete. Tell others how it went by leaving a review.",
            ),
            NotificationKind::BookingCancelled => (
                "Booking cancelled",
                "The booking for {{service_name}} on {{booking_date}} was cancelled. Reason: {{reason}}",
            ),
            NotificationKind::GroupMinimumReached => (
                "Group minimum reached",
                "{{group_name}} now has {{participant_count}} participants and will go ahead.",
            ),
            NotificationKind::GroupConfirmed => (
                "Group booking confirmed",
                "{{group_name}} is full and confirmed for {{booking_date}}.",
            ),
            NotificationKind::GroupBelowMinimum => (
                "Group below minimum",
                "{{group_name}} dropped to {{participant_count}} participants, below the minimum of {{min_participants}}.",
            ),
            NotificationKind::GroupCancelled => (
                "Group booking cancelled",
                "{{group_name}} was cancelled by the organizer. Reason: {{reason}}",
            ),
            NotificationKind::WaitlistJoined => (
                "New waitlist entry",
                "A client joined the waitlist for {{service_name}} on {{preferred_date}}.",
            ),
            NotificationKind::WaitlistSpotAvailable => (
                "A spot opened up",
                "{{service_name}} has availability on {{preferred_date}}. Book before {{expires_at}} to keep your spot.",
            ),
            NotificationKind::BookingReminder => (
                "Upcoming booking",
                "Reminder: {{service_name}} starts in {{hours_before}} hours, on {{booking_date}}.",
            ),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of template variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemplateVar {
    ServiceName,
    BookingDate,
    Reason,
    GroupName,
    ParticipantCount,
    MinParticipants,
    PreferredDate,
    ExpiresAt,
    HoursBefore,
}

impl TemplateVar {
    pub fn key(&self) -> &'static str {
        match self {
            TemplateVar::ServiceName => "service_name",
            TemplateVar::BookingDate => "booking_date",
            TemplateVar::Reason => "reason",
            TemplateVar::GroupName => "group_name",
            TemplateVar::ParticipantCount => "participant_count",
            TemplateVar::MinParticipants => "min_participants",
            TemplateVar::PreferredDate => "preferred_date",
            TemplateVar::ExpiresAt => "expires_at",
            TemplateVar::HoursBefore => "hours_before",
        }
    }

    fn placeholder(&self) -> String {
        format!("{{{{{}}}}}", self.key())
    }
}

/// A notification ready to be rendered and delivered
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    vars: BTreeMap<TemplateVar, String>,
    /// Structured payload stored with in-app rows and realtime events
    pub data: serde_json::Value,
}

/// Output of the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn reason_or_default(reason: Option<&str>) -> String {
    reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("not specified")
        .to_string()
}

impl Notification {
    fn new<const N: usize>(kind: NotificationKind, vars: [(TemplateVar, String); N], data: serde_json::Value) -> Self {
        Self {
            kind,
            vars: vars.into_iter().collect(),
            data,
        }
    }

    pub fn var(&self, var: TemplateVar) -> Option<&str> {
        self.vars.get(&var).map(String::as_str)
    }

    fn booking_data(booking: &Booking) -> serde_json::Value {
        json!({ "booking_id": booking.id, "service_id": booking.service_id })
    }

    pub fn booking_requested(booking: &Booking, service_name: &str) -> Self {
        Self::new(
            NotificationKind::BookingRequested,
            [
                (TemplateVar::ServiceName, service_name.to_string()),
                (TemplateVar::BookingDate, format_instant(booking.booking_date)),
            ],
            Self::booking_data(booking),
        )
    }

    pub fn booking_accepted(booking: &Booking, service_name: &str) -> Self {
        Self::new(
            NotificationKind::BookingAccepted,
            [
                (TemplateVar::ServiceName, service_name.to_string()),
                (TemplateVar::BookingDate, format_instant(booking.booking_date)),
            ],
            Self::booking_data(booking),
        )
    }

    pub fn booking_declined(booking: &Booking, service_name: &str, reason: Option<&str>) -> Self {
        Self::new(
            NotificationKind::BookingDeclined,
            [
                (TemplateVar::ServiceName, service_name.to_string()),
                (TemplateVar::BookingDate, format_instant(booking.booking_date)),
                (TemplateVar::Reason, reason_or_default(reason)),
            ],
            Self::booking_data(booking),
        )
    }

    pub fn booking_completed(booking: &Booking, service_name: &str) -> Self {
        Self::new(
            NotificationKind::BookingCompleted,
            [(TemplateVar::ServiceName, service_name.to_string())],
            Self::booking_data(booking),
        )
    }

    pub fn booking_cancelled(booking: &Booking, service_name: &str, reason: Option<&str>) -> Self {
        Self::new(
            NotificationKind::BookingCancelled,
            [
                (TemplateVar::ServiceName, service_name.to_string()),
                (TemplateVar::BookingDate, format_instant(booking.booking_date)),
                (TemplateVar::Reason, reason_or_default(reason)),
            ],
            Self::booking_data(booking),
        )
    }

    pub fn group_minimum_reached(group_id: Uuid, group_name: &str, participant_count: i64) -> Self {
        Self::new(
            NotificationKind::GroupMinimumReached,
            [
                (TemplateVar::GroupName, group_name.to_string()),
                (TemplateVar::ParticipantCount, participant_count.to_string()),
            ],
            json!({ "group_booking_id": group_id }),
        )
    }

    pub fn group_confirmed(group_id: Uuid, group_name: &str, starts_at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::GroupConfirmed,
            [
                (TemplateVar::GroupName, group_name.to_string()),
                (TemplateVar::BookingDate, format_instant(starts_at)),
            ],
            json!({ "group_booking_id": group_id }),
        )
    }

    pub fn group_below_minimum(group_id: Uuid, group_name: &str, participant_count: i64, min_participants: i32) -> Self {
        Self::new(
            NotificationKind::GroupBelowMinimum,
            [
                (TemplateVar::GroupName, group_name.to_string()),
                (TemplateVar::ParticipantCount, participant_count.to_string()),
                (TemplateVar::MinParticipants, min_participants.to_string()),
            ],
            json!({ "group_booking_id": group_id }),
        )
    }

    pub fn group_cancelled(group_id: Uuid, group_name: &str, reason: Option<&str>) -> Self {
        Self::new(
            NotificationKind::GroupCancelled,
            [
                (TemplateVar::GroupName, group_name.to_string()),
                (TemplateVar::Reason, reason_or_default(reason)),
            ],
            json!({ "group_booking_id": group_id }),
        )
    }

    pub fn waitlist_joined(entry_id: Uuid, service_name: &str, preferred_date: NaiveDate) -> Self {
        Self::new(
            NotificationKind::WaitlistJoined,
            [
                (TemplateVar::ServiceName, service_name.to_string()),
                (TemplateVar::PreferredDate, preferred_date.to_string()),
            ],
            json!({ "waitlist_entry_id": entry_id }),
        )
    }

    pub fn waitlist_spot_available(
        entry_id: Uuid,
        service_name: &str,
        preferred_date: NaiveDate,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            NotificationKind::WaitlistSpotAvailable,
            [
                (TemplateVar::ServiceName, service_name.to_string()),
                (TemplateVar::PreferredDate, preferred_date.to_string()),
                (TemplateVar::ExpiresAt, format_instant(expires_at)),
            ],
            json!({ "waitlist_entry_id": entry_id, "expires_at": expires_at }),
        )
    }

    pub fn booking_reminder(booking: &Booking, service_name: &str, hours_before: i64) -> Self {
        Self::new(
            NotificationKind::BookingReminder,
            [
                (TemplateVar::ServiceName, service_name.to_string()),
                (TemplateVar::BookingDate, format_instant(booking.booking_date)),
                (TemplateVar::HoursBefore, hours_before.to_string()),
            ],
            Self::booking_data(booking),
        )
    }
}

/// Substitute every variable of `notification` into its kind's template
pub fn render(notification: &Notification) -> RenderedNotification {
    let (title, body) = notification.kind.template();
    let fill = |template: &str| {
        notification
            .vars
            .iter()
            .fold(template.to_string(), |text, (var, value)| text.replace(&var.placeholder(), value))
    };

    RenderedNotification {
        kind: notification.kind,
        title: fill(title),
        body: fill(body),
        data: notification.data.clone(),
    }
}
