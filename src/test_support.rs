// Shared fixtures for the service-level and HTTP tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::app::{AppState, Collaborators, Repositories};
use crate::bookings::{Booking, CreateBookingRequest};
use crate::catalog::{AddOn, Bundle, CatalogRepository, GroupSettings, PriceType, Service, ServiceStatus, UserContact};
use crate::clock::ManualClock;
use crate::config::ServiceSettings;
use crate::notifications::{
    BroadcastPublisher, Channel, ChannelOutcome, InAppNotification, NotificationKind, Notifier, Recipient,
    RenderedNotification,
};
use crate::store::InMemoryStore;

/// Monday 2025-03-03 09:00 UTC
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
}

/// One external delivery seen by the recording notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub channel: Channel,
}

/// Notifier that records deliveries and can be told to fail channels
#[derive(Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    failing: Mutex<HashSet<Channel>>,
}

impl RecordingNotifier {
    pub fn fail_channel(&self, channel: Channel) {
        self.failing.lock().unwrap().insert(channel);
    }

    pub fn heal_channel(&self, channel: Channel) {
        self.failing.lock().unwrap().remove(&channel);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn deliveries_to(&self, user_id: Uuid) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.user_id == user_id)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        notification: &RenderedNotification,
        recipient: &Recipient,
        channels: &[Channel],
    ) -> Vec<ChannelOutcome> {
        let failing = self.failing.lock().unwrap().clone();
        channels
            .iter()
            .map(|&channel| {
                if failing.contains(&channel) {
                    return ChannelOutcome::failed(channel, "gateway unavailable");
                }
                self.deliveries.lock().unwrap().push(Delivery {
                    user_id: recipient.user_id,
                    kind: notification.kind,
                    channel,
                });
                ChannelOutcome::delivered(channel)
            })
            .collect()
    }
}

/// Fully wired application over the in-memory store and a manual clock
pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub realtime: Arc<BroadcastPublisher>,
    pub state: AppState,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(ServiceSettings::default())
    }

    pub fn with_settings(settings: ServiceSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start_instant()));
        let notifier = Arc::new(RecordingNotifier::default());
        let realtime = Arc::new(BroadcastPublisher::default());

        let state = AppState::build(
            Repositories::in_memory(store.clone()),
            Collaborators {
                notifier: notifier.clone(),
                realtime: realtime.clone(),
                clock: clock.clone(),
            },
            settings,
        );

        Self {
            store,
            clock,
            notifier,
            realtime,
            state,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        crate::clock::Clock::now(self.clock.as_ref())
    }

    /// `days` after the harness start, at `hour`:00 UTC
    pub fn day_at(&self, days: i64, hour: u32) -> DateTime<Utc> {
        let day = start_instant().date_naive() + Duration::days(days);
        day.and_hms_opt(hour, 0, 0).unwrap().and_utc()
    }

    /// A user with email, phone and every channel enabled
    pub fn user(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert_contact(UserContact {
                id,
                name: name.to_string(),
                email: Some(format!("{}@example.com", name.to_lowercase())),
                phone: Some("+15550100".to_string()),
                email_enabled: true,
                sms_enabled: true,
                push_enabled: true,
            })
            .unwrap();
        id
    }

    /// An active fixed-price service (100.00, 60 minutes) of a new provider
    pub fn service(&self) -> Service {
        self.service_with(|_| {})
    }

    pub fn service_with(&self, configure: impl FnOnce(&mut Service)) -> Service {
        let mut service = Service {
            id: Uuid::new_v4(),
            provider_id: self.user("Provider"),
            name: "Deep tissue massage".to_string(),
            price: dec!(100.00),
            price_type: PriceType::Fixed,
            status: ServiceStatus::Active,
            duration_minutes: Some(60),
            max_bookings: None,
            buffer_time: None,
            booking_count: 0,
            rating_average: None,
            review_count: 0,
            created_at: start_instant() - Duration::days(30),
        };
        configure(&mut service);
        self.store.insert_service(service.clone()).unwrap();
        service
    }

    pub fn group_settings(&self, service: &Service, min: i32, max: i32, discount: Decimal) {
        self.store
            .insert_group_settings(GroupSettings {
                service_id: service.id,
                enabled: true,
                max_participants: max,
                min_participants: min,
                group_discount: discount,
            })
            .unwrap();
    }

    pub fn bundle(&self, service: &Service, discount_percent: Decimal) -> Bundle {
        let bundle = Bundle {
            id: Uuid::new_v4(),
            provider_id: service.provider_id,
            name: "Wellness pack".to_string(),
            discount_percent,
            active: true,
        };
        self.store.insert_bundle(bundle.clone(), vec![service.id]).unwrap();
        bundle
    }

    pub fn add_on(&self, service: &Service, price: Decimal) -> AddOn {
        let add_on = AddOn {
            id: Uuid::new_v4(),
            service_id: service.id,
            name: "Hot stones".to_string(),
            price,
            active: true,
        };
        self.store.insert_add_on(add_on.clone()).unwrap();
        add_on
    }

    pub async fn book(&self, client_id: Uuid, service: &Service, at: DateTime<Utc>) -> Booking {
        self.state
            .bookings
            .create_booking(client_id, CreateBookingRequest::new(service.id, at))
            .await
            .unwrap()
            .booking
    }

    /// A booking already accepted by the provider
    pub async fn accepted(&self, client_id: Uuid, service: &Service, at: DateTime<Utc>) -> Booking {
        let booking = self.book(client_id, service, at).await;
        self.state
            .bookings
            .accept_booking(service.provider_id, booking.id)
            .await
            .unwrap()
    }

    pub async fn stored_service(&self, service_id: Uuid) -> Service {
        CatalogRepository::find_service(self.store.as_ref(), service_id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn inbox(&self, user_id: Uuid) -> Vec<InAppNotification> {
        self.state.dispatcher.inbox(user_id, false).await.unwrap()
    }

    pub async fn inbox_kinds(&self, user_id: Uuid) -> Vec<NotificationKind> {
        self.inbox(user_id).await.into_iter().map(|n| n.kind).collect()
    }
}
