use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::bookings::BookingStatus;
use crate::catalog::Service;
use crate::error::DomainError;
use crate::notifications::NotificationKind;
use crate::test_support::TestHarness;
use crate::waitlist::{ConvertWaitlistRequest, JoinWaitlistRequest, NotifyWaitlistRequest, WaitlistStatus};

fn join_request(service: &Service, preferred: DateTime<Utc>) -> JoinWaitlistRequest {
    JoinWaitlistRequest {
        service_id: service.id,
        preferred_date: preferred,
        preferred_time: None,
        alternative_dates: Vec::new(),
        priority: None,
        notes: Some("mornings preferred".to_string()),
    }
}

fn convert_request(at: DateTime<Utc>) -> ConvertWaitlistRequest {
    ConvertWaitlistRequest {
        booking_date: at,
        end_date: None,
        address: None,
    }
}

#[tokio::test]
async fn test_join_leave_and_rejoin() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");

    let mut request = join_request(&service, h.day_at(4, 15));
    request.alternative_dates = vec![h.day_at(6, 9), h.day_at(5, 9), h.day_at(6, 17)];
    let entry = h.state.waitlist.join(client, request).await.unwrap();

    assert_eq!(entry.status, WaitlistStatus::Active);
    assert_eq!(entry.preferred_date, h.day_at(4, 0).date_naive());
    assert_eq!(
        entry.alternative_dates,
        vec![h.day_at(5, 0).date_naive(), h.day_at(6, 0).date_naive()]
    );
    assert!(h
        .inbox_kinds(service.provider_id)
        .await
        .contains(&NotificationKind::WaitlistJoined));

    let duplicate = h
        .state
        .waitlist
        .join(client, join_request(&service, h.day_at(7, 9)))
        .await;
    assert!(matches!(duplicate, Err(DomainError::Conflict(_))));

    let stranger = h.user("Stranger");
    let denied = h.state.waitlist.leave(stranger, entry.id).await;
    assert!(matches!(denied, Err(DomainError::Forbidden(_))));

    let left = h.state.waitlist.leave(client, entry.id).await.unwrap();
    assert_eq!(left.status, WaitlistStatus::Cancelled);

    let again = h.state.waitlist.leave(client, entry.id).await;
    assert!(matches!(again, Err(DomainError::InvalidState(_))));

    // the old row is reused
    let rejoined = h
        .state
        .waitlist
        .join(client, join_request(&service, h.day_at(7, 9)))
        .await
        .unwrap();
    assert_eq!(rejoined.id, entry.id);
    assert_eq!(rejoined.status, WaitlistStatus::Active);
    assert_eq!(rejoined.preferred_date, h.day_at(7, 0).date_naive());
    assert!(rejoined.alternative_dates.is_empty());

    assert_eq!(h.state.waitlist.list_mine(client).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_provider_cannot_join_own_waitlist() {
    let h = TestHarness::new();
    let service = h.service();

    let own = h
        .state
        .waitlist
        .join(service.provider_id, join_request(&service, h.day_at(4, 9)))
        .await;
    assert!(matches!(own, Err(DomainError::Forbidden(_))));

    let mut unknown = join_request(&service, h.day_at(4, 9));
    unknown.service_id = Uuid::new_v4();
    let unknown = h.state.waitlist.join(h.user("Client"), unknown).await;
    assert!(matches!(unknown, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_notify_and_convert_once() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let entry = h
        .state
        .waitlist
        .join(client, join_request(&service, h.day_at(4, 9)))
        .await
        .unwrap();

    let denied = h
        .state
        .waitlist
        .notify(client, entry.id, NotifyWaitlistRequest::default())
        .await;
    assert!(matches!(denied, Err(DomainError::Forbidden(_))));

    let offered = h
        .state
        .waitlist
        .notify(
            service.provider_id,
            entry.id,
            NotifyWaitlistRequest {
                expires_in_hours: Some(6),
            },
        )
        .await
        .unwrap();
    assert_eq!(offered.status, WaitlistStatus::Notified);
    assert_eq!(offered.notified_at, Some(h.now()));
    assert_eq!(offered.expires_at, Some(h.now() + Duration::hours(6)));
    assert!(h
        .inbox_kinds(client)
        .await
        .contains(&NotificationKind::WaitlistSpotAvailable));

    let twice = h
        .state
        .waitlist
        .notify(service.provider_id, entry.id, NotifyWaitlistRequest::default())
        .await;
    assert!(matches!(twice, Err(DomainError::InvalidState(_))));

    h.clock.advance(Duration::hours(5));
    let conversion = h
        .state
        .waitlist
        .convert(client, entry.id, convert_request(h.day_at(4, 9)))
        .await
        .unwrap();
    assert_eq!(conversion.entry.status, WaitlistStatus::Booked);
    assert_eq!(conversion.booking.booking.status, BookingStatus::Pending);
    assert_eq!(conversion.booking.booking.client_id, client);
    assert_eq!(conversion.booking.booking.notes.as_deref(), Some("mornings preferred"));

    let second = h
        .state
        .waitlist
        .convert(client, entry.id, convert_request(h.day_at(4, 11)))
        .await;
    assert!(matches!(second, Err(DomainError::InvalidState(_))));
    assert_eq!(h.stored_service(service.id).await.booking_count, 1);
}

#[tokio::test]
async fn test_expired_offer_cannot_convert_and_reverts() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let entry = h
        .state
        .waitlist
        .join(client, join_request(&service, h.day_at(4, 9)))
        .await
        .unwrap();
    h.state
        .waitlist
        .notify(service.provider_id, entry.id, NotifyWaitlistRequest::default())
        .await
        .unwrap();

    h.clock.advance(Duration::hours(25));
    let late = h
        .state
        .waitlist
        .convert(client, entry.id, convert_request(h.day_at(4, 9)))
        .await;
    assert!(matches!(late, Err(DomainError::Validation(_))));

    assert_eq!(h.state.matcher.expire_offers().await.unwrap(), 1);
    let entries = h.state.waitlist.list_mine(client).await.unwrap();
    assert_eq!(entries[0].status, WaitlistStatus::Active);
    assert_eq!(entries[0].expires_at, None);

    assert_eq!(h.state.matcher.expire_offers().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_conversion_keeps_offer_open() {
    let h = TestHarness::new();
    let service = h.service_with(|s| s.max_bookings = Some(1));
    let client = h.user("Client");
    let other = h.user("Other");
    h.book(other, &service, h.day_at(4, 9)).await;

    let entry = h
        .state
        .waitlist
        .join(client, join_request(&service, h.day_at(4, 9)))
        .await
        .unwrap();
    h.state
        .waitlist
        .notify(service.provider_id, entry.id, NotifyWaitlistRequest::default())
        .await
        .unwrap();

    let full = h
        .state
        .waitlist
        .convert(client, entry.id, convert_request(h.day_at(4, 14)))
        .await;
    assert!(matches!(full, Err(DomainError::Conflict(_))));

    let entries = h.state.waitlist.list_mine(client).await.unwrap();
    assert_eq!(entries[0].status, WaitlistStatus::Notified);

    // another day still works while the offer is open
    let conversion = h
        .state
        .waitlist
        .convert(client, entry.id, convert_request(h.day_at(5, 14)))
        .await
        .unwrap();
    assert_eq!(conversion.entry.status, WaitlistStatus::Booked);
}

#[tokio::test]
async fn test_cancellation_offers_slot_to_top_entries() {
    let h = TestHarness::new();
    let service = h.service();
    let day = h.day_at(4, 9);

    let mut entries = Vec::new();
    for priority in 0..6 {
        let client = h.user("Waiting");
        let mut request = join_request(&service, day);
        request.priority = Some(priority);
        entries.push(h.state.waitlist.join(client, request).await.unwrap());
    }
    let elsewhere = h.user("Elsewhere");
    h.state
        .waitlist
        .join(elsewhere, join_request(&service, h.day_at(9, 9)))
        .await
        .unwrap();

    let client = h.user("Client");
    let booking = h.book(client, &service, day).await;
    h.state
        .bookings
        .cancel_booking(client, booking.id, None)
        .await
        .unwrap();

    let live = h
        .state
        .waitlist
        .list_for_service(service.provider_id, service.id)
        .await
        .unwrap();
    assert_eq!(live.len(), 7);
    let status_of = |id: Uuid| live.iter().find(|e| e.id == id).map(|e| e.status);

    // priority 0 is the sixth in line
    assert_eq!(status_of(entries[0].id), Some(WaitlistStatus::Active));
    for entry in &entries[1..] {
        assert_eq!(status_of(entry.id), Some(WaitlistStatus::Notified));
    }
    assert_eq!(
        live.iter().find(|e| e.client_id == elsewhere).map(|e| e.status),
        Some(WaitlistStatus::Active)
    );

    let denied = h.state.waitlist.list_for_service(client, service.id).await;
    assert!(matches!(denied, Err(DomainError::Forbidden(_))));
}
