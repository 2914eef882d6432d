// Application wiring: repositories, services and the HTTP router

use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bookings::{self, BookingRepository, BookingService, PgBookingRepository};
use crate::catalog::{CatalogRepository, PgCatalogRepository};
use crate::clock::{Clock, SystemClock};
use crate::config::ServiceSettings;
use crate::groups::{self, GroupRepository, GroupService, PgGroupRepository};
use crate::notifications::{
    self, BroadcastPublisher, LogNotifier, NotificationDispatcher, NotificationRepository, Notifier,
    PgNotificationRepository, RealtimePublisher,
};
use crate::recurring::{self, PgRecurringRepository, RecurringRepository, RecurringService};
use crate::reminders::{PgReminderRepository, ReminderRepository, ReminderScheduler};
use crate::reviews::{self, PgReviewRepository, RatingCalculator, ReviewRepository, ReviewService};
use crate::store::InMemoryStore;
use crate::waitlist::{self, PgWaitlistRepository, WaitlistMatcher, WaitlistRepository, WaitlistService};

/// One handle per repository trait
#[derive(Clone)]
pub struct Repositories {
    pub catalog: Arc<dyn CatalogRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub recurring: Arc<dyn RecurringRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub waitlist: Arc<dyn WaitlistRepository>,
    pub reminders: Arc<dyn ReminderRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            catalog: Arc::new(PgCatalogRepository::new(pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(pool.clone())),
            recurring: Arc::new(PgRecurringRepository::new(pool.clone())),
            groups: Arc::new(PgGroupRepository::new(pool.clone())),
            waitlist: Arc::new(PgWaitlistRepository::new(pool.clone())),
            reminders: Arc::new(PgReminderRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            reviews: Arc::new(PgReviewRepository::new(pool)),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            catalog: store.clone(),
            bookings: store.clone(),
            recurring: store.clone(),
            groups: store.clone(),
            waitlist: store.clone(),
            reminders: store.clone(),
            notifications: store.clone(),
            reviews: store,
        }
    }
}

/// External collaborators injected into the services
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub realtime: Arc<dyn RealtimePublisher>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            notifier: Arc::new(LogNotifier),
            realtime: Arc::new(BroadcastPublisher::default()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub recurring: Arc<RecurringService>,
    pub groups: Arc<GroupService>,
    pub waitlist: Arc<WaitlistService>,
    pub reviews: Arc<ReviewService>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub reminders: Arc<ReminderScheduler>,
    pub matcher: Arc<WaitlistMatcher>,
}

impl AppState {
    pub fn build(repos: Repositories, collaborators: Collaborators, settings: ServiceSettings) -> Self {
        let Collaborators {
            notifier,
            realtime,
            clock,
        } = collaborators;

        let dispatcher = Arc::new(NotificationDispatcher::new(
            repos.notifications.clone(),
            repos.catalog.clone(),
            notifier,
            realtime,
            clock.clone(),
        ));
        let reminders = Arc::new(ReminderScheduler::new(
            repos.reminders.clone(),
            repos.bookings.clone(),
            repos.catalog.clone(),
            dispatcher.clone(),
            clock.clone(),
        ));
        let matcher = Arc::new(WaitlistMatcher::new(
            repos.waitlist.clone(),
            repos.catalog.clone(),
            dispatcher.clone(),
            clock.clone(),
            settings.waitlist_offer_hours,
        ));
        let bookings = Arc::new(BookingService::new(
            repos.bookings.clone(),
            repos.catalog.clone(),
            dispatcher.clone(),
            reminders.clone(),
            matcher.clone(),
            clock.clone(),
        ));
        let recurring = Arc::new(RecurringService::new(
            repos.recurring.clone(),
            repos.bookings.clone(),
            repos.catalog.clone(),
            bookings.clone(),
            clock.clone(),
        ));
        let groups = Arc::new(GroupService::new(
            repos.groups.clone(),
            repos.bookings.clone(),
            repos.catalog.clone(),
            bookings.clone(),
            dispatcher.clone(),
            clock.clone(),
        ));
        let waitlist = Arc::new(WaitlistService::new(
            repos.waitlist.clone(),
            repos.catalog.clone(),
            bookings.clone(),
            matcher.clone(),
            dispatcher.clone(),
            clock.clone(),
        ));
        let reviews = Arc::new(ReviewService::new(
            repos.reviews.clone(),
            repos.bookings.clone(),
            RatingCalculator::new(repos.reviews, repos.catalog),
            clock,
        ));

        Self {
            bookings,
            recurring,
            groups,
            waitlist,
            reviews,
            dispatcher,
            reminders,
            matcher,
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Creates and configures the application router
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        // Bookings
        .route(
            "/api/bookings",
            post(bookings::create_booking_handler).get(bookings::list_bookings_handler),
        )
        .route("/api/bookings/:id", get(bookings::get_booking_handler))
        .route("/api/bookings/:id/accept", post(bookings::accept_booking_handler))
        .route("/api/bookings/:id/decline", post(bookings::decline_booking_handler))
        .route("/api/bookings/:id/status", patch(bookings::update_booking_status_handler))
        // Recurring series
        .route(
            "/api/recurring",
            post(recurring::create_series_handler).get(recurring::list_series_handler),
        )
        .route("/api/recurring/:id", get(recurring::get_series_handler))
        .route("/api/recurring/:id/pause", post(recurring::pause_series_handler))
        .route("/api/recurring/:id/resume", post(recurring::resume_series_handler))
        .route("/api/recurring/:id/cancel", post(recurring::cancel_series_handler))
        // Group bookings
        .route("/api/groups", post(groups::create_group_handler))
        .route("/api/groups/:id", get(groups::get_group_handler))
        .route("/api/groups/:id/join", post(groups::join_group_handler))
        .route("/api/groups/:id/leave", post(groups::leave_group_handler))
        .route("/api/groups/:id/cancel", post(groups::cancel_group_handler))
        // Waitlist
        .route(
            "/api/waitlist",
            post(waitlist::join_waitlist_handler).get(waitlist::list_my_waitlist_handler),
        )
        .route("/api/waitlist/:id", delete(waitlist::leave_waitlist_handler))
        .route("/api/waitlist/:id/notify", post(waitlist::notify_waitlist_handler))
        .route("/api/waitlist/:id/convert", post(waitlist::convert_waitlist_handler))
        .route("/api/services/:id/waitlist", get(waitlist::list_service_waitlist_handler))
        // Reviews
        .route("/api/reviews", post(reviews::create_review_handler))
        .route("/api/services/:id/reviews", get(reviews::get_reviews_for_service_handler))
        // In-app inbox
        .route("/api/notifications", get(notifications::list_notifications_handler))
        .route(
            "/api/notifications/:id/read",
            post(notifications::mark_notification_read_handler),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}
