// Service-level booking scenarios over the in-memory store

use chrono::Duration;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::bookings::{
    BookingListQuery, BookingStatus, CreateBookingRequest, PartyRole, PaymentStatus, UpdateStatusRequest,
};
use crate::catalog::{PriceType, ServiceStatus};
use crate::error::DomainError;
use crate::notifications::NotificationKind;
use crate::reminders::{ReminderStatus, ReminderType};
use crate::test_support::TestHarness;
use crate::waitlist::{JoinWaitlistRequest, WaitlistStatus};

#[tokio::test]
async fn test_create_accept_complete_flow() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");

    let created = h
        .state
        .bookings
        .create_booking(client, CreateBookingRequest::new(service.id, h.day_at(3, 10)))
        .await
        .unwrap();

    assert_eq!(created.booking.status, BookingStatus::Pending);
    assert_eq!(created.booking.total_price, dec!(100.00));
    let payment = created.payment.unwrap();
    assert_eq!(payment.amount, dec!(100.00));
    assert_eq!(payment.service_fee, dec!(10.00));
    assert_eq!(payment.net_amount, dec!(90.00));
    assert_eq!(payment.service_fee + payment.net_amount, payment.amount);
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(h.stored_service(service.id).await.booking_count, 1);
    assert!(h
        .inbox_kinds(service.provider_id)
        .await
        .contains(&NotificationKind::BookingRequested));

    let accepted = h
        .state
        .bookings
        .accept_booking(service.provider_id, created.booking.id)
        .await
        .unwrap();
    assert_eq!(accepted.status, BookingStatus::Accepted);
    assert!(h.inbox_kinds(client).await.contains(&NotificationKind::BookingAccepted));

    h.clock.set(h.day_at(3, 12));
    let completed = h
        .state
        .bookings
        .complete_booking(service.provider_id, created.booking.id)
        .await
        .unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);
    let completed_at = completed.completed_at.unwrap();
    assert_eq!(completed_at, h.day_at(3, 12));

    let details = h.state.bookings.get_booking(client, completed.id).await.unwrap();
    let payment = details.payment.unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.escrow_release_date, Some(completed_at + Duration::days(15)));
    assert_eq!(h.stored_service(service.id).await.booking_count, 1);
}

#[tokio::test]
async fn test_decline_restores_counter_once() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let booking = h.book(client, &service, h.day_at(2, 14)).await;

    let declined = h
        .state
        .bookings
        .decline_booking(service.provider_id, booking.id, Some("conflict".to_string()))
        .await
        .unwrap();

    assert_eq!(declined.status, BookingStatus::Declined);
    assert_eq!(declined.cancellation_reason.as_deref(), Some("conflict"));
    assert_eq!(declined.cancelled_by, Some(service.provider_id));
    assert_eq!(h.stored_service(service.id).await.booking_count, 0);

    let payment = h.state.bookings.get_booking(client, booking.id).await.unwrap().payment.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    let inbox = h.inbox(client).await;
    let notice = inbox
        .iter()
        .find(|n| n.kind == NotificationKind::BookingDeclined)
        .expect("client should be told about the decline");
    assert!(notice.body.contains("conflict"));

    let again = h
        .state
        .bookings
        .decline_booking(service.provider_id, booking.id, Some("conflict".to_string()))
        .await;
    assert!(matches!(again, Err(DomainError::InvalidState(_))));
    assert_eq!(h.stored_service(service.id).await.booking_count, 0);
}

#[tokio::test]
async fn test_cancel_accepted_refunds_and_offers_waitlist() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let waiting = h.user("Waiting");
    let start = h.day_at(4, 10);

    let entry = h
        .state
        .waitlist
        .join(
            waiting,
            JoinWaitlistRequest {
                service_id: service.id,
                preferred_date: start,
                preferred_time: None,
                alternative_dates: Vec::new(),
                priority: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let booking = h.accepted(client, &service, start).await;
    let cancelled = h
        .state
        .bookings
        .cancel_booking(client, booking.id, Some("emergency".to_string()))
        .await
        .unwrap();

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("emergency"));
    assert_eq!(h.stored_service(service.id).await.booking_count, 0);

    let payment = h.state.bookings.get_booking(client, booking.id).await.unwrap().payment.unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
    assert_eq!(payment.refund_amount, Some(payment.amount));
    assert_eq!(payment.refunded_at, Some(h.now()));

    // the provider is told, the cancelling client is not
    assert!(h
        .inbox_kinds(service.provider_id)
        .await
        .contains(&NotificationKind::BookingCancelled));
    assert!(!h.inbox_kinds(client).await.contains(&NotificationKind::BookingCancelled));

    let offered = h.state.waitlist.list_mine(waiting).await.unwrap().remove(0);
    assert_eq!(offered.id, entry.id);
    assert_eq!(offered.status, WaitlistStatus::Notified);
    assert!(h
        .inbox_kinds(waiting)
        .await
        .contains(&NotificationKind::WaitlistSpotAvailable));
    assert_eq!(offered.expires_at, Some(h.now() + Duration::hours(24)));
}

#[tokio::test]
async fn test_hourly_price_bills_started_hours() {
    let h = TestHarness::new();
    let service = h.service_with(|s| {
        s.price = dec!(25.00);
        s.price_type = PriceType::Hourly;
    });
    let client = h.user("Client");

    let mut request = CreateBookingRequest::new(service.id, h.day_at(1, 9));
    request.end_date = Some(h.day_at(1, 11));
    let two_hours = h.state.bookings.create_booking(client, request).await.unwrap();
    assert_eq!(two_hours.booking.total_price, dec!(50.00));

    let mut request = CreateBookingRequest::new(service.id, h.day_at(2, 9));
    request.end_date = Some(h.day_at(2, 11) + Duration::minutes(10));
    let partial = h.state.bookings.create_booking(client, request).await.unwrap();
    assert_eq!(partial.booking.total_price, dec!(75.00));
}

#[tokio::test]
async fn test_bundle_discount_then_add_ons() {
    let h = TestHarness::new();
    let service = h.service();
    let bundle = h.bundle(&service, dec!(10));
    let add_on = h.add_on(&service, dec!(15.00));
    let client = h.user("Client");

    let mut request = CreateBookingRequest::new(service.id, h.day_at(1, 9));
    request.bundle_id = Some(bundle.id);
    request.add_on_ids = vec![add_on.id, add_on.id];

    let created = h.state.bookings.create_booking(client, request).await.unwrap();
    assert_eq!(created.booking.total_price, dec!(105.00));
    assert_eq!(created.payment.unwrap().service_fee, dec!(10.50));
}

#[tokio::test]
async fn test_foreign_add_on_is_rejected() {
    let h = TestHarness::new();
    let service = h.service();
    let other = h.service();
    let foreign = h.add_on(&other, dec!(5.00));
    let client = h.user("Client");

    let mut request = CreateBookingRequest::new(service.id, h.day_at(1, 9));
    request.add_on_ids = vec![foreign.id];

    let result = h.state.bookings.create_booking(client, request).await;
    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert_eq!(h.stored_service(service.id).await.booking_count, 0);
}

#[tokio::test]
async fn test_daily_cap_rejects_and_reopens() {
    let h = TestHarness::new();
    let service = h.service_with(|s| s.max_bookings = Some(2));
    let client = h.user("Client");

    let first = h.book(client, &service, h.day_at(5, 9)).await;
    h.book(client, &service, h.day_at(5, 13)).await;

    let third = h
        .state
        .bookings
        .create_booking(client, CreateBookingRequest::new(service.id, h.day_at(5, 16)))
        .await;
    assert!(matches!(third, Err(DomainError::Conflict(_))));

    // another day is unaffected
    h.book(client, &service, h.day_at(6, 9)).await;

    h.state
        .bookings
        .decline_booking(service.provider_id, first.id, None)
        .await
        .unwrap();
    let retried = h
        .state
        .bookings
        .create_booking(client, CreateBookingRequest::new(service.id, h.day_at(5, 16)))
        .await;
    assert!(retried.is_ok());
}

#[tokio::test]
async fn test_buffer_time_blocks_adjacent_slots() {
    let h = TestHarness::new();
    let service = h.service_with(|s| s.buffer_time = Some(30));
    let client = h.user("Client");
    let other = h.user("Other");

    let first = h.book(client, &service, h.day_at(2, 10)).await;
    let slots = h.store.as_ref();
    let blocked = crate::bookings::BookingRepository::find_time_slots(slots, first.id)
        .await
        .unwrap();
    assert_eq!(blocked.len(), 2);

    let inside_buffer = h
        .state
        .bookings
        .create_booking(
            other,
            CreateBookingRequest::new(service.id, h.day_at(2, 11) + Duration::minutes(15)),
        )
        .await;
    assert!(matches!(inside_buffer, Err(DomainError::Conflict(_))));

    // touching the buffer edge is allowed
    let after_buffer = h
        .state
        .bookings
        .create_booking(
            other,
            CreateBookingRequest::new(service.id, h.day_at(2, 11) + Duration::minutes(30)),
        )
        .await;
    assert!(after_buffer.is_ok());

    h.state
        .bookings
        .cancel_booking(client, first.id, None)
        .await
        .unwrap();
    let freed = crate::bookings::BookingRepository::find_time_slots(slots, first.id)
        .await
        .unwrap();
    assert!(freed.is_empty());
}

#[tokio::test]
async fn test_creation_guards() {
    let h = TestHarness::new();
    let service = h.service();
    let inactive = h.service_with(|s| s.status = ServiceStatus::Inactive);
    let client = h.user("Client");

    let own = h
        .state
        .bookings
        .create_booking(service.provider_id, CreateBookingRequest::new(service.id, h.day_at(1, 9)))
        .await;
    assert!(matches!(own, Err(DomainError::Forbidden(_))));

    let closed = h
        .state
        .bookings
        .create_booking(client, CreateBookingRequest::new(inactive.id, h.day_at(1, 9)))
        .await;
    assert!(matches!(closed, Err(DomainError::InvalidState(_))));

    let missing = h
        .state
        .bookings
        .create_booking(client, CreateBookingRequest::new(Uuid::new_v4(), h.day_at(1, 9)))
        .await;
    assert!(matches!(missing, Err(DomainError::NotFound { .. })));

    let mut backwards = CreateBookingRequest::new(service.id, h.day_at(1, 9));
    backwards.end_date = Some(h.day_at(1, 8));
    let backwards = h.state.bookings.create_booking(client, backwards).await;
    assert!(matches!(backwards, Err(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_transition_permissions() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let stranger = h.user("Stranger");
    let booking = h.book(client, &service, h.day_at(1, 9)).await;

    let by_client = h.state.bookings.accept_booking(client, booking.id).await;
    assert!(matches!(by_client, Err(DomainError::Forbidden(_))));

    let by_stranger = h.state.bookings.cancel_booking(stranger, booking.id, None).await;
    assert!(matches!(by_stranger, Err(DomainError::Forbidden(_))));

    let peek = h.state.bookings.get_booking(stranger, booking.id).await;
    assert!(matches!(peek, Err(DomainError::Forbidden(_))));

    let early = h.state.bookings.complete_booking(service.provider_id, booking.id).await;
    assert!(matches!(early, Err(DomainError::InvalidState(_))));
}

#[tokio::test]
async fn test_update_status_routes_transitions() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let booking = h.book(client, &service, h.day_at(1, 9)).await;

    let back = h
        .state
        .bookings
        .update_status(
            service.provider_id,
            booking.id,
            UpdateStatusRequest {
                status: BookingStatus::Pending,
                reason: None,
            },
        )
        .await;
    assert!(matches!(back, Err(DomainError::InvalidState(_))));

    let accepted = h
        .state
        .bookings
        .update_status(
            service.provider_id,
            booking.id,
            UpdateStatusRequest {
                status: BookingStatus::Accepted,
                reason: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(accepted.status, BookingStatus::Accepted);

    let cancelled = h
        .state
        .bookings
        .update_status(
            service.provider_id,
            booking.id,
            UpdateStatusRequest {
                status: BookingStatus::Cancelled,
                reason: Some("provider ill".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(h.inbox_kinds(client).await.contains(&NotificationKind::BookingCancelled));
}

#[tokio::test]
async fn test_accept_schedules_reminders_and_cancel_clears_them() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let booking = h.accepted(client, &service, h.day_at(3, 10)).await;

    let reminders = h.state.reminders.find_for_booking(booking.id).await.unwrap();
    assert_eq!(reminders.len(), 3);
    assert!(reminders
        .iter()
        .any(|r| r.reminder_type == ReminderType::Push2h && r.scheduled_for == h.day_at(3, 8)));

    h.state.bookings.cancel_booking(client, booking.id, None).await.unwrap();
    let reminders = h.state.reminders.find_for_booking(booking.id).await.unwrap();
    assert!(reminders.iter().all(|r| r.status == ReminderStatus::Cancelled));
}

#[tokio::test]
async fn test_list_bookings_by_role_and_status() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let first = h.book(client, &service, h.day_at(1, 9)).await;
    h.book(client, &service, h.day_at(2, 9)).await;
    h.state
        .bookings
        .accept_booking(service.provider_id, first.id)
        .await
        .unwrap();

    let as_client = h
        .state
        .bookings
        .list_bookings(
            client,
            BookingListQuery {
                role: Some(PartyRole::Client),
                status: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(as_client.len(), 2);
    assert!(as_client[0].booking_date > as_client[1].booking_date);

    let as_provider = h
        .state
        .bookings
        .list_bookings(
            client,
            BookingListQuery {
                role: Some(PartyRole::Provider),
                status: None,
            },
        )
        .await
        .unwrap();
    assert!(as_provider.is_empty());

    let accepted = h
        .state
        .bookings
        .list_bookings(
            service.provider_id,
            BookingListQuery {
                role: None,
                status: Some(BookingStatus::Accepted),
            },
        )
        .await
        .unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, first.id);
}

#[tokio::test]
async fn test_notification_failure_does_not_roll_back() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    h.notifier.fail_channel(crate::notifications::Channel::Email);

    let booking = h.book(client, &service, h.day_at(1, 9)).await;
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(h.stored_service(service.id).await.booking_count, 1);
    assert!(h
        .inbox_kinds(service.provider_id)
        .await
        .contains(&NotificationKind::BookingRequested));
}
