use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::CatalogRepository;
use crate::error::DomainResult;
use crate::reviews::ReviewRepository;

/// Arithmetic mean of the ratings, `None` when there are none
pub fn average_rating(ratings: &[i16]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    Some(sum as f64 / ratings.len() as f64)
}

/// Calculator for computing and updating average ratings
#[derive(Clone)]
pub struct RatingCalculator {
    reviews: Arc<dyn ReviewRepository>,
    catalog: Arc<dyn CatalogRepository>,
}

impl RatingCalculator {
    pub fn new(reviews: Arc<dyn ReviewRepository>, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { reviews, catalog }
    }

    /// Recalculate and store the average rating of a service
    ///
    /// This method:
    /// 1. Fetches all ratings for the given service
    /// 2. Calculates the arithmetic mean
    /// 3. Updates the service with the new average and count
    /// 4. Returns the calculated average (or None if no reviews exist)
    pub async fn recalculate_average(&self, service_id: Uuid) -> DomainResult<Option<f64>> {
        let ratings = self.reviews.ratings_for_service(service_id).await?;
        let average = average_rating(&ratings);

        self.catalog
            .update_service_rating(service_id, average, ratings.len() as i32)
            .await?;

        tracing::debug!(%service_id, ?average, count = ratings.len(), "service rating recalculated");
        Ok(average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_ratings_has_no_average() {
        assert_eq!(average_rating(&[]), None);
    }

    #[test]
    fn test_average_of_ratings() {
        assert_eq!(average_rating(&[5]), Some(5.0));
        assert_eq!(average_rating(&[4, 5]), Some(4.5));
        assert_eq!(average_rating(&[1, 2, 3, 4, 5]), Some(3.0));
    }

    proptest! {
        #[test]
        fn prop_average_stays_within_rating_bounds(ratings in proptest::collection::vec(1i16..=5, 1..200)) {
            let average = average_rating(&ratings).unwrap();
            prop_assert!((1.0..=5.0).contains(&average));
        }
    }
}
