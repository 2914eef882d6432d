// In-memory implementation of every repository trait
//
// All collections live behind one mutex; a multi-step write holds the lock
// for its whole duration.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::bookings::{
    Booking, BookingRepository, BookingStatus, CapacityGuard, CreateGuards, FeeBreakdown, NewBooking, PartyRole,
    Payment, PaymentStatus, TimeSlot, TransitionChange, Window,
};
use crate::catalog::{AddOn, Bundle, CatalogRepository, GroupSettings, Service, UserContact};
use crate::error::{DomainError, DomainResult};
use crate::groups::{GroupBooking, GroupRepository, GroupStatus};
use crate::notifications::{InAppNotification, NotificationRepository};
use crate::recurring::{RecurringBooking, RecurringRepository, RecurringStatus};
use crate::reminders::{BookingReminder, ReminderRepository, ReminderStatus};
use crate::reviews::{Review, ReviewRepository};
use crate::waitlist::{WaitlistEntry, WaitlistJoin, WaitlistRepository, WaitlistStatus};

#[derive(Default)]
struct MemoryState {
    services: HashMap<Uuid, Service>,
    group_settings: HashMap<Uuid, GroupSettings>,
    /// Bundle with the ids of its member services
    bundles: HashMap<Uuid, (Bundle, Vec<Uuid>)>,
    add_ons: HashMap<Uuid, AddOn>,
    contacts: HashMap<Uuid, UserContact>,
    bookings: Vec<Booking>,
    /// Keyed by booking id
    payments: HashMap<Uuid, Payment>,
    time_slots: Vec<TimeSlot>,
    recurring: HashMap<Uuid, RecurringBooking>,
    groups: HashMap<Uuid, GroupBooking>,
    waitlist: Vec<WaitlistEntry>,
    reminders: Vec<BookingReminder>,
    notifications: Vec<InAppNotification>,
    reviews: Vec<Review>,
}

/// Process-local store used by the test-suite and when no database is configured
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> DomainResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| DomainError::Internal("in-memory store lock poisoned".to_string()))
    }

    pub fn insert_service(&self, service: Service) -> DomainResult<()> {
        self.state()?.services.insert(service.id, service);
        Ok(())
    }

    pub fn insert_group_settings(&self, settings: GroupSettings) -> DomainResult<()> {
        self.state()?.group_settings.insert(settings.service_id, settings);
        Ok(())
    }

    pub fn insert_bundle(&self, bundle: Bundle, service_ids: Vec<Uuid>) -> DomainResult<()> {
        self.state()?.bundles.insert(bundle.id, (bundle, service_ids));
        Ok(())
    }

    pub fn insert_add_on(&self, add_on: AddOn) -> DomainResult<()> {
        self.state()?.add_ons.insert(add_on.id, add_on);
        Ok(())
    }

    pub fn insert_contact(&self, contact: UserContact) -> DomainResult<()> {
        self.state()?.contacts.insert(contact.id, contact);
        Ok(())
    }
}

fn active_on_day(state: &MemoryState, service_id: Uuid, day: NaiveDate) -> i64 {
    let window = Window::day(day);
    state
        .bookings
        .iter()
        .filter(|b| b.service_id == service_id && b.status.holds_capacity() && window.contains(b.booking_date))
        .count() as i64
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn find_service(&self, id: Uuid) -> DomainResult<Option<Service>> {
        Ok(self.state()?.services.get(&id).cloned())
    }

    async fn find_group_settings(&self, service_id: Uuid) -> DomainResult<Option<GroupSettings>> {
        Ok(self.state()?.group_settings.get(&service_id).cloned())
    }

    async fn find_bundle_for_service(&self, bundle_id: Uuid, service_id: Uuid) -> DomainResult<Option<Bundle>> {
        let state = self.state()?;
        Ok(state
            .bundles
            .get(&bundle_id)
            .filter(|(_, members)| members.contains(&service_id))
            .map(|(bundle, _)| bundle.clone()))
    }

    async fn find_add_ons(&self, service_id: Uuid, ids: &[Uuid]) -> DomainResult<Vec<AddOn>> {
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.add_ons.get(id))
            .filter(|add_on| add_on.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn find_contact(&self, user_id: Uuid) -> DomainResult<Option<UserContact>> {
        Ok(self.state()?.contacts.get(&user_id).cloned())
    }

    async fn update_service_rating(&self, service_id: Uuid, average: Option<f64>, count: i32) -> DomainResult<()> {
        let mut state = self.state()?;
        let service = state
            .services
            .get_mut(&service_id)
            .ok_or_else(|| DomainError::not_found("Service", service_id))?;
        service.rating_average = average;
        service.review_count = count;
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create(
        &self,
        booking: NewBooking,
        fees: FeeBreakdown,
        guards: &CreateGuards,
    ) -> DomainResult<(Booking, Payment)> {
        let mut guard = self.state()?;
        let state = &mut *guard;

        if !state.services.contains_key(&booking.service_id) {
            return Err(DomainError::not_found("Service", booking.service_id));
        }

        if guards.max_per_day.is_some() {
            let active = active_on_day(state, booking.service_id, booking.booking_date.date_naive());
            CapacityGuard::check_daily_limit(guards.max_per_day, active)?;
        }

        if let Some(seat) = guards.group {
            let group = state
                .groups
                .get(&seat.group_booking_id)
                .ok_or_else(|| DomainError::not_found("GroupBooking", seat.group_booking_id))?;
            group.status.ensure_accepting()?;

            let members: Vec<&Booking> = state
                .bookings
                .iter()
                .filter(|b| b.group_booking_id == Some(seat.group_booking_id) && !b.status.is_withdrawn())
                .collect();
            if members.iter().any(|b| b.client_id == booking.client_id) {
                return Err(DomainError::Conflict("Already a participant of this group".to_string()));
            }
            if members.len() as i64 >= i64::from(seat.max_participants) {
                return Err(DomainError::Conflict("Group booking is full".to_string()));
            }
        }

        if let Some(window) = guards.buffer_check {
            let provider_slots: Vec<TimeSlot> = state
                .time_slots
                .iter()
                .filter(|slot| slot.provider_id == booking.provider_id)
                .cloned()
                .collect();
            if CapacityGuard::overlaps_any(window, &provider_slots) {
                return Err(DomainError::Conflict(
                    "Requested time falls inside the provider's buffer time".to_string(),
                ));
            }
        }

        let created_at = booking.created_at;
        let inserted = booking.into_booking();
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: inserted.id,
            amount: fees.amount,
            status: PaymentStatus::Pending,
            service_fee: fees.service_fee,
            net_amount: fees.net_amount,
            escrow_release_date: None,
            refund_amount: None,
            refunded_at: None,
            created_at,
            updated_at: created_at,
        };

        if let Some(service) = state.services.get_mut(&inserted.service_id) {
            service.booking_count += 1;
        }
        state.payments.insert(inserted.id, payment.clone());
        state.bookings.push(inserted.clone());

        Ok((inserted, payment))
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Booking>> {
        Ok(self.state()?.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn find_payment(&self, booking_id: Uuid) -> DomainResult<Option<Payment>> {
        Ok(self.state()?.payments.get(&booking_id).cloned())
    }

    async fn transition(&self, id: Uuid, change: &TransitionChange) -> DomainResult<Option<Booking>> {
        let mut guard = self.state()?;
        let state = &mut *guard;

        let Some(booking) = state.bookings.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        if booking.status != change.expected {
            return Ok(None);
        }

        booking.status = change.to;
        if change.reason.is_some() {
            booking.cancellation_reason = change.reason.clone();
        }
        if change.actor.is_some() {
            booking.cancelled_by = change.actor;
        }
        if change.completed_at.is_some() {
            booking.completed_at = change.completed_at;
        }
        booking.updated_at = change.at;
        let updated = booking.clone();

        if let Some(payment_status) = change.payment_status {
            if let Some(payment) = state.payments.get_mut(&id) {
                payment.status = payment_status;
                if change.escrow_release_date.is_some() {
                    payment.escrow_release_date = change.escrow_release_date;
                }
                if change.refund {
                    payment.refund_amount = Some(payment.amount);
                    payment.refunded_at = Some(change.at);
                }
                payment.updated_at = change.at;
            }
        }

        if change.booking_count_delta != 0 {
            if let Some(service) = state.services.get_mut(&updated.service_id) {
                service.booking_count = (service.booking_count + change.booking_count_delta).max(0);
            }
        }

        if change.release_slots {
            state.time_slots.retain(|slot| slot.booking_id != id);
        }

        Ok(Some(updated))
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        role: Option<PartyRole>,
        status: Option<BookingStatus>,
    ) -> DomainResult<Vec<Booking>> {
        let state = self.state()?;
        let mut bookings: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| match role {
                Some(PartyRole::Client) => b.client_id == user_id,
                Some(PartyRole::Provider) => b.provider_id == user_id,
                None => b.involves(user_id),
            })
            .filter(|b| status.map_or(true, |status| b.status == status))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        Ok(bookings)
    }

    async fn find_by_recurring(&self, series_id: Uuid) -> DomainResult<Vec<Booking>> {
        let state = self.state()?;
        let mut bookings: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| b.recurring_booking_id == Some(series_id))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.booking_date);
        Ok(bookings)
    }

    async fn find_by_group(&self, group_id: Uuid) -> DomainResult<Vec<Booking>> {
        let state = self.state()?;
        let mut bookings: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| b.group_booking_id == Some(group_id))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn insert_time_slots(&self, slots: &[TimeSlot]) -> DomainResult<()> {
        self.state()?.time_slots.extend_from_slice(slots);
        Ok(())
    }

    async fn find_time_slots(&self, booking_id: Uuid) -> DomainResult<Vec<TimeSlot>> {
        let state = self.state()?;
        let mut slots: Vec<TimeSlot> = state
            .time_slots
            .iter()
            .filter(|slot| slot.booking_id == booking_id)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.start_time);
        Ok(slots)
    }
}

#[async_trait]
impl RecurringRepository for InMemoryStore {
    async fn insert(&self, series: &RecurringBooking) -> DomainResult<RecurringBooking> {
        self.state()?.recurring.insert(series.id, series.clone());
        Ok(series.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<RecurringBooking>> {
        Ok(self.state()?.recurring.get(&id).cloned())
    }

    async fn find_for_user(&self, user_id: Uuid) -> DomainResult<Vec<RecurringBooking>> {
        let state = self.state()?;
        let mut series: Vec<RecurringBooking> =
            state.recurring.values().filter(|s| s.involves(user_id)).cloned().collect();
        series.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(series)
    }

    async fn find_active(&self) -> DomainResult<Vec<RecurringBooking>> {
        let state = self.state()?;
        let mut series: Vec<RecurringBooking> = state
            .recurring
            .values()
            .filter(|s| s.status == RecurringStatus::Active)
            .cloned()
            .collect();
        series.sort_by_key(|s| s.created_at);
        Ok(series)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[RecurringStatus],
        to: RecurringStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<RecurringBooking>> {
        let mut state = self.state()?;
        Ok(state
            .recurring
            .get_mut(&id)
            .filter(|series| expected.contains(&series.status))
            .map(|series| {
                series.status = to;
                series.updated_at = at;
                series.clone()
            }))
    }
}

#[async_trait]
impl GroupRepository for InMemoryStore {
    async fn insert(&self, group: &GroupBooking) -> DomainResult<GroupBooking> {
        self.state()?.groups.insert(group.id, group.clone());
        Ok(group.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<GroupBooking>> {
        Ok(self.state()?.groups.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[GroupStatus],
        to: GroupStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<GroupBooking>> {
        let mut state = self.state()?;
        Ok(state
            .groups
            .get_mut(&id)
            .filter(|group| expected.contains(&group.status))
            .map(|group| {
                group.status = to;
                group.updated_at = at;
                group.clone()
            }))
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.state()?.groups.remove(&id);
        Ok(())
    }
}

fn sort_by_priority(entries: &mut [WaitlistEntry]) {
    entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
}

#[async_trait]
impl WaitlistRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<WaitlistEntry>> {
        Ok(self.state()?.waitlist.iter().find(|e| e.id == id).cloned())
    }

    async fn find_for_client_service(&self, service_id: Uuid, client_id: Uuid) -> DomainResult<Option<WaitlistEntry>> {
        let state = self.state()?;
        Ok(state
            .waitlist
            .iter()
            .filter(|e| e.service_id == service_id && e.client_id == client_id)
            .max_by_key(|e| e.updated_at)
            .cloned())
    }

    async fn insert(&self, entry: &WaitlistEntry) -> DomainResult<WaitlistEntry> {
        let mut state = self.state()?;
        let live = state.waitlist.iter().any(|e| {
            e.service_id == entry.service_id && e.client_id == entry.client_id && !e.status.is_terminal()
        });
        if live {
            return Err(DomainError::Conflict("Already on the waitlist for this service".to_string()));
        }
        state.waitlist.push(entry.clone());
        Ok(entry.clone())
    }

    async fn rejoin(&self, id: Uuid, join: &WaitlistJoin) -> DomainResult<Option<WaitlistEntry>> {
        let mut state = self.state()?;
        Ok(state
            .waitlist
            .iter_mut()
            .find(|e| e.id == id && e.status.is_terminal())
            .map(|entry| {
                entry.status = WaitlistStatus::Active;
                entry.preferred_date = join.preferred_date;
                entry.preferred_time = join.preferred_time;
                entry.alternative_dates = join.alternative_dates.clone();
                entry.priority = join.priority;
                entry.notes = join.notes.clone();
                entry.notified_at = None;
                entry.expires_at = None;
                entry.updated_at = join.at;
                entry.clone()
            }))
    }

    async fn find_matching(&self, service_id: Uuid, day: NaiveDate, limit: i64) -> DomainResult<Vec<WaitlistEntry>> {
        let state = self.state()?;
        let mut entries: Vec<WaitlistEntry> = state
            .waitlist
            .iter()
            .filter(|e| e.service_id == service_id && e.status == WaitlistStatus::Active && e.wants(day))
            .cloned()
            .collect();
        sort_by_priority(&mut entries);
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn mark_notified(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<Option<WaitlistEntry>> {
        let mut state = self.state()?;
        Ok(state
            .waitlist
            .iter_mut()
            .find(|e| e.id == id && e.status == WaitlistStatus::Active)
            .map(|entry| {
                entry.status = WaitlistStatus::Notified;
                entry.notified_at = Some(at);
                entry.expires_at = Some(expires_at);
                entry.updated_at = at;
                entry.clone()
            }))
    }

    async fn claim_for_booking(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<Option<WaitlistEntry>> {
        let mut state = self.state()?;
        Ok(state
            .waitlist
            .iter_mut()
            .find(|e| {
                e.id == id && e.status == WaitlistStatus::Notified && e.expires_at.is_some_and(|expires| expires > now)
            })
            .map(|entry| {
                entry.status = WaitlistStatus::Booked;
                entry.updated_at = now;
                entry.clone()
            }))
    }

    async fn restore_notified(&self, id: Uuid) -> DomainResult<()> {
        let mut state = self.state()?;
        if let Some(entry) = state
            .waitlist
            .iter_mut()
            .find(|e| e.id == id && e.status == WaitlistStatus::Booked)
        {
            entry.status = WaitlistStatus::Notified;
        }
        Ok(())
    }

    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<Option<WaitlistEntry>> {
        let mut state = self.state()?;
        Ok(state
            .waitlist
            .iter_mut()
            .find(|e| e.id == id && !e.status.is_terminal())
            .map(|entry| {
                entry.status = WaitlistStatus::Cancelled;
                entry.updated_at = at;
                entry.clone()
            }))
    }

    async fn revert_expired(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let mut state = self.state()?;
        let mut reverted = 0;
        for entry in state.waitlist.iter_mut().filter(|e| {
            e.status == WaitlistStatus::Notified && e.expires_at.is_some_and(|expires| expires <= now)
        }) {
            entry.status = WaitlistStatus::Active;
            entry.notified_at = None;
            entry.expires_at = None;
            entry.updated_at = now;
            reverted += 1;
        }
        Ok(reverted)
    }

    async fn find_for_client(&self, client_id: Uuid) -> DomainResult<Vec<WaitlistEntry>> {
        let state = self.state()?;
        let mut entries: Vec<WaitlistEntry> =
            state.waitlist.iter().filter(|e| e.client_id == client_id).cloned().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn find_active_for_service(&self, service_id: Uuid) -> DomainResult<Vec<WaitlistEntry>> {
        let state = self.state()?;
        let mut entries: Vec<WaitlistEntry> = state
            .waitlist
            .iter()
            .filter(|e| e.service_id == service_id && !e.status.is_terminal())
            .cloned()
            .collect();
        sort_by_priority(&mut entries);
        Ok(entries)
    }
}

#[async_trait]
impl ReminderRepository for InMemoryStore {
    async fn insert_if_absent(&self, reminder: &BookingReminder) -> DomainResult<bool> {
        let mut state = self.state()?;
        let exists = state.reminders.iter().any(|r| {
            r.booking_id == reminder.booking_id
                && r.reminder_type == reminder.reminder_type
                && r.scheduled_for == reminder.scheduled_for
        });
        if exists {
            return Ok(false);
        }
        state.reminders.push(reminder.clone());
        Ok(true)
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> DomainResult<Vec<BookingReminder>> {
        let state = self.state()?;
        let mut due: Vec<BookingReminder> = state
            .reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Pending && r.scheduled_for <= now)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.scheduled_for);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn find_retryable(
        &self,
        now: DateTime<Utc>,
        max_retries: i32,
        limit: i64,
    ) -> DomainResult<Vec<BookingReminder>> {
        let state = self.state()?;
        let mut retryable: Vec<BookingReminder> = state
            .reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Failed && r.retry_count < max_retries)
            .filter(|r| {
                state
                    .bookings
                    .iter()
                    .any(|b| b.id == r.booking_id && b.booking_date > now && b.status.holds_capacity())
            })
            .cloned()
            .collect();
        retryable.sort_by_key(|r| r.scheduled_for);
        retryable.truncate(limit.max(0) as usize);
        Ok(retryable)
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        let mut state = self.state()?;
        if let Some(reminder) = state.reminders.iter_mut().find(|r| r.id == id) {
            reminder.status = ReminderStatus::Sent;
            reminder.sent_at = Some(at);
            reminder.last_error = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> DomainResult<()> {
        let mut state = self.state()?;
        if let Some(reminder) = state.reminders.iter_mut().find(|r| r.id == id) {
            reminder.status = ReminderStatus::Failed;
            reminder.last_error = Some(error.to_string());
            reminder.retry_count += 1;
        }
        Ok(())
    }

    async fn cancel_pending(&self, booking_id: Uuid) -> DomainResult<u64> {
        let mut state = self.state()?;
        let mut cancelled = 0;
        for reminder in state
            .reminders
            .iter_mut()
            .filter(|r| r.booking_id == booking_id && r.status == ReminderStatus::Pending)
        {
            reminder.status = ReminderStatus::Cancelled;
            cancelled += 1;
        }
        Ok(cancelled)
    }

    async fn find_for_booking(&self, booking_id: Uuid) -> DomainResult<Vec<BookingReminder>> {
        let state = self.state()?;
        let mut reminders: Vec<BookingReminder> = state
            .reminders
            .iter()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.scheduled_for);
        Ok(reminders)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert(&self, notification: &InAppNotification) -> DomainResult<()> {
        self.state()?.notifications.push(notification.clone());
        Ok(())
    }

    async fn find_for_user(&self, user_id: Uuid, unread_only: bool) -> DomainResult<Vec<InAppNotification>> {
        let state = self.state()?;
        let mut inbox: Vec<InAppNotification> = state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        inbox.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(inbox)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DomainResult<Option<InAppNotification>> {
        let mut state = self.state()?;
        Ok(state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|notification| {
                notification.read = true;
                notification.clone()
            }))
    }
}

#[async_trait]
impl ReviewRepository for InMemoryStore {
    async fn insert(&self, review: &Review) -> DomainResult<Review> {
        let mut state = self.state()?;
        if state.reviews.iter().any(|r| r.booking_id == review.booking_id) {
            return Err(DomainError::Conflict("This booking has already been reviewed".to_string()));
        }
        state.reviews.push(review.clone());
        Ok(review.clone())
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> DomainResult<Option<Review>> {
        Ok(self.state()?.reviews.iter().find(|r| r.booking_id == booking_id).cloned())
    }

    async fn find_for_service(&self, service_id: Uuid) -> DomainResult<Vec<Review>> {
        let state = self.state()?;
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .rev()
            .filter(|r| r.service_id == service_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn ratings_for_service(&self, service_id: Uuid) -> DomainResult<Vec<i16>> {
        let state = self.state()?;
        Ok(state
            .reviews
            .iter()
            .filter(|r| r.service_id == service_id)
            .map(|r| r.rating)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookings::BookingStatus;
    use crate::catalog::{PriceType, ServiceStatus};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn service(max_bookings: Option<i32>) -> Service {
        Service {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            name: "Massage".to_string(),
            price: dec!(100.00),
            price_type: PriceType::Fixed,
            status: ServiceStatus::Active,
            duration_minutes: Some(60),
            max_bookings,
            buffer_time: None,
            booking_count: 0,
            rating_average: None,
            review_count: 0,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn new_booking(service: &Service, hour: u32) -> NewBooking {
        NewBooking {
            id: Uuid::new_v4(),
            service_id: service.id,
            client_id: Uuid::new_v4(),
            provider_id: service.provider_id,
            booking_date: Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap(),
            end_date: None,
            total_price: service.price,
            notes: None,
            address: None,
            recurring_booking_id: None,
            group_booking_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_daily_cap_is_checked_inside_create() {
        let store = InMemoryStore::new();
        let service = service(Some(1));
        store.insert_service(service.clone()).unwrap();
        let guards = CreateGuards {
            max_per_day: Some(1),
            ..CreateGuards::default()
        };

        store
            .create(new_booking(&service, 9), FeeBreakdown::for_amount(dec!(100.00)), &guards)
            .await
            .unwrap();
        let second = store
            .create(new_booking(&service, 14), FeeBreakdown::for_amount(dec!(100.00)), &guards)
            .await;

        assert!(matches!(second, Err(DomainError::Conflict(_))));
        let stored = CatalogRepository::find_service(&store, service.id).await.unwrap().unwrap();
        assert_eq!(stored.booking_count, 1);
    }

    #[tokio::test]
    async fn test_transition_guards_on_expected_status() {
        let store = InMemoryStore::new();
        let service = service(None);
        store.insert_service(service.clone()).unwrap();
        let (booking, _) = store
            .create(
                new_booking(&service, 9),
                FeeBreakdown::for_amount(dec!(100.00)),
                &CreateGuards::default(),
            )
            .await
            .unwrap();

        let at = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
        let decline = TransitionChange::new(BookingStatus::Pending, BookingStatus::Declined, at);
        assert!(store.transition(booking.id, &decline).await.unwrap().is_some());
        // second attempt lost the race: status is no longer pending
        assert!(store.transition(booking.id, &decline).await.unwrap().is_none());

        let payment = store.find_payment(booking.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        let stored = CatalogRepository::find_service(&store, service.id).await.unwrap().unwrap();
        assert_eq!(stored.booking_count, 0);
    }
}
