use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;

use crate::bookings::BookingStatus;
use crate::catalog::Service;
use crate::error::DomainError;
use crate::notifications::NotificationKind;
use crate::recurring::{CreateRecurringRequest, Frequency, GenerationReport, RecurringStatus};
use crate::test_support::TestHarness;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn request(service: &Service, frequency: Frequency, start: NaiveDate, occurrences: i32) -> CreateRecurringRequest {
    CreateRecurringRequest {
        service_id: service.id,
        frequency,
        interval: 1,
        start_date: start,
        end_date: None,
        occurrences: Some(occurrences),
        days_of_week: Vec::new(),
        day_of_month: None,
        time_of_day: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        duration_minutes: 60,
        notes: Some("standing appointment".to_string()),
        address: None,
    }
}

#[tokio::test]
async fn test_weekly_wednesday_series() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");

    let mut weekly = request(&service, Frequency::Weekly, date(2025, 3, 5), 4);
    weekly.days_of_week = vec![3];
    let details = h.state.recurring.create_series(client, weekly).await.unwrap();

    assert_eq!(details.series.status, RecurringStatus::Active);
    assert_eq!(details.bookings.len(), 4);
    for booking in &details.bookings {
        assert_eq!(booking.booking_date.weekday(), Weekday::Wed);
        assert_eq!(booking.recurring_booking_id, Some(details.series.id));
        assert!(booking.is_recurring);
        assert_eq!(booking.end_date, Some(booking.booking_date + Duration::minutes(60)));
        assert_eq!(booking.notes.as_deref(), Some("standing appointment"));
    }
    for pair in details.bookings.windows(2) {
        assert_eq!(pair[1].booking_date - pair[0].booking_date, Duration::days(7));
    }
    assert_eq!(h.stored_service(service.id).await.booking_count, 4);

    // nothing left to plan: the series completes
    let report = h.state.recurring.generate_upcoming().await.unwrap();
    assert_eq!(
        report,
        GenerationReport {
            series_scanned: 1,
            bookings_created: 0,
            series_completed: 1,
        }
    );
    let series = h.state.recurring.get_series(client, details.series.id).await.unwrap();
    assert_eq!(series.series.status, RecurringStatus::Completed);
}

#[tokio::test]
async fn test_generate_upcoming_tops_up_batch() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");

    let details = h
        .state
        .recurring
        .create_series(client, request(&service, Frequency::Daily, date(2025, 3, 4), 10))
        .await
        .unwrap();
    assert_eq!(details.bookings.len(), 4);

    // two of the four have started
    h.clock.set(h.day_at(2, 12));
    let report = h.state.recurring.generate_upcoming().await.unwrap();
    assert_eq!(report.bookings_created, 2);
    assert_eq!(report.series_completed, 0);

    let series = h.state.recurring.get_series(client, details.series.id).await.unwrap();
    let dates: Vec<NaiveDate> = series.bookings.iter().map(|b| b.booking_date.date_naive()).collect();
    assert_eq!(
        dates,
        vec![
            date(2025, 3, 4),
            date(2025, 3, 5),
            date(2025, 3, 6),
            date(2025, 3, 7),
            date(2025, 3, 8),
            date(2025, 3, 9),
        ]
    );

    // a full batch ahead: nothing to do
    let report = h.state.recurring.generate_upcoming().await.unwrap();
    assert_eq!(report.bookings_created, 0);
}

#[tokio::test]
async fn test_full_day_skips_occurrence_but_keeps_series() {
    let h = TestHarness::new();
    let service = h.service_with(|s| s.max_bookings = Some(1));
    let client = h.user("Client");
    let other = h.user("Other");
    h.book(other, &service, h.day_at(2, 8)).await;

    let details = h
        .state
        .recurring
        .create_series(client, request(&service, Frequency::Daily, date(2025, 3, 4), 4))
        .await
        .unwrap();

    assert_eq!(details.series.status, RecurringStatus::Active);
    let dates: Vec<NaiveDate> = details.bookings.iter().map(|b| b.booking_date.date_naive()).collect();
    assert_eq!(dates, vec![date(2025, 3, 4), date(2025, 3, 6), date(2025, 3, 7)]);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");

    let mut weekly = request(&service, Frequency::Weekly, date(2025, 3, 5), 4);
    weekly.days_of_week = vec![3];
    let details = h.state.recurring.create_series(client, weekly).await.unwrap();
    let series_id = details.series.id;

    let paused = h.state.recurring.pause(client, series_id).await.unwrap();
    assert_eq!(paused.series.status, RecurringStatus::Paused);
    assert!(paused.bookings.iter().all(|b| b.status == BookingStatus::Cancelled));
    assert!(paused
        .bookings
        .iter()
        .all(|b| b.cancellation_reason.as_deref() == Some("Recurring series paused")));
    assert_eq!(h.stored_service(service.id).await.booking_count, 0);
    assert!(h
        .inbox_kinds(service.provider_id)
        .await
        .contains(&NotificationKind::BookingCancelled));

    let again = h.state.recurring.pause(client, series_id).await;
    assert!(matches!(again, Err(DomainError::InvalidState(_))));

    // paused series are not topped up
    let report = h.state.recurring.generate_upcoming().await.unwrap();
    assert_eq!(report.series_scanned, 0);

    let resumed = h
        .state
        .recurring
        .resume(client, series_id, date(2025, 3, 12))
        .await
        .unwrap();
    assert_eq!(resumed.series.status, RecurringStatus::Active);
    let pending: Vec<NaiveDate> = resumed
        .bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Pending)
        .map(|b| b.booking_date.date_naive())
        .collect();
    assert_eq!(pending, vec![date(2025, 3, 12), date(2025, 3, 19), date(2025, 3, 26)]);
    assert_eq!(h.stored_service(service.id).await.booking_count, 3);
}

#[tokio::test]
async fn test_cancel_series_by_provider() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let stranger = h.user("Stranger");

    let details = h
        .state
        .recurring
        .create_series(client, request(&service, Frequency::Daily, date(2025, 3, 4), 6))
        .await
        .unwrap();
    let series_id = details.series.id;

    let denied = h.state.recurring.cancel_series(stranger, series_id).await;
    assert!(matches!(denied, Err(DomainError::Forbidden(_))));

    let cancelled = h
        .state
        .recurring
        .cancel_series(service.provider_id, series_id)
        .await
        .unwrap();
    assert_eq!(cancelled.series.status, RecurringStatus::Cancelled);
    assert!(cancelled.bookings.iter().all(|b| b.status == BookingStatus::Cancelled));
    assert!(cancelled
        .bookings
        .iter()
        .all(|b| b.cancelled_by == Some(service.provider_id)));
    assert!(h.inbox_kinds(client).await.contains(&NotificationKind::BookingCancelled));

    let resume = h.state.recurring.resume(client, series_id, date(2025, 3, 10)).await;
    assert!(matches!(resume, Err(DomainError::InvalidState(_))));

    let listed = h.state.recurring.list_series(service.provider_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(h.state.recurring.list_series(stranger).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_series() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");

    let too_many = h
        .state
        .recurring
        .create_series(client, request(&service, Frequency::Daily, date(2025, 3, 4), 400))
        .await;
    assert!(matches!(too_many, Err(DomainError::Validation(_))));

    let mut in_the_past = request(&service, Frequency::Daily, date(2025, 1, 1), 5);
    in_the_past.end_date = Some(date(2025, 1, 31));
    let in_the_past = h.state.recurring.create_series(client, in_the_past).await;
    assert!(matches!(in_the_past, Err(DomainError::Validation(_))));

    let own = h
        .state
        .recurring
        .create_series(service.provider_id, request(&service, Frequency::Daily, date(2025, 3, 4), 3))
        .await;
    assert!(matches!(own, Err(DomainError::Forbidden(_))));

    let unknown = h
        .state
        .recurring
        .get_series(client, Uuid::new_v4())
        .await;
    assert!(matches!(unknown, Err(DomainError::NotFound { .. })));
}
