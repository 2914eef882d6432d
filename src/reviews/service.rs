use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::{BookingRepository, BookingStatus};
use crate::clock::Clock;
use crate::effects::PostCommit;
use crate::error::{DomainError, DomainResult};
use crate::reviews::{CreateReviewRequest, RatingCalculator, Review, ReviewRepository};

/// Service layer for review business logic
#[derive(Clone)]
pub struct ReviewService {
    repository: Arc<dyn ReviewRepository>,
    bookings: Arc<dyn BookingRepository>,
    rating_calculator: RatingCalculator,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    pub fn new(
        repository: Arc<dyn ReviewRepository>,
        bookings: Arc<dyn BookingRepository>,
        rating_calculator: RatingCalculator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            bookings,
            rating_calculator,
            clock,
        }
    }

    /// Review a completed booking
    ///
    /// This method:
    /// 1. Validates the request
    /// 2. Checks the caller is the booking's client and the booking is completed
    /// 3. Rejects a second review of the same booking
    /// 4. Creates the review
    /// 5. Recalculates the service's average rating
    pub async fn create_review(&self, client_id: Uuid, request: CreateReviewRequest) -> DomainResult<Review> {
        request.validate()?;

        let booking = self
            .bookings
            .find_by_id(request.booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", request.booking_id))?;

        if booking.client_id != client_id {
            return Err(DomainError::Forbidden(
                "Only the client of a booking can review it".to_string(),
            ));
        }
        if booking.status != BookingStatus::Completed {
            return Err(DomainError::InvalidState(format!(
                "Only completed bookings can be reviewed, this one is {}",
                booking.status
            )));
        }

        if self.repository.find_by_booking(booking.id).await?.is_some() {
            return Err(DomainError::Conflict("This booking has already been reviewed".to_string()));
        }

        let now = self.clock.now();
        let review = self
            .repository
            .insert(&Review {
                id: Uuid::new_v4(),
                booking_id: booking.id,
                service_id: booking.service_id,
                client_id,
                rating: request.rating,
                comment: request.comment,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(review_id = %review.id, service_id = %review.service_id, rating = review.rating, "review created");

        PostCommit::new("create_review")
            .then("recalculate_rating", async {
                self.rating_calculator
                    .recalculate_average(review.service_id)
                    .await
                    .map(|_| ())
            })
            .run()
            .await;

        Ok(review)
    }

    pub async fn get_reviews_for_service(&self, service_id: Uuid) -> DomainResult<Vec<Review>> {
        self.repository.find_for_service(service_id).await
    }
}
