//! Guest reviews: create and read only; reviews are immutable once written.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{authenticate, AuthError};
use crate::domain::{next_review_id, ListingId, Review, ReviewId, UserId};
use crate::repository::{ListingRepository, RepositoryError, ReviewRepository, UserRepository};

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub listing_id: String,
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewListQuery {
    pub listing_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub review_id: ReviewId,
    pub listing_id: ListingId,
    pub reviewer: UserId,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        Self {
            review_id: review.review_id,
            listing_id: review.listing,
            reviewer: review.reviewer,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("rating must be between 1 and 5")]
    InvalidRating,
    #[error("review not found")]
    NotFound,
    #[error("listing not found")]
    UnknownListing,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReviewError::InvalidRating => StatusCode::BAD_REQUEST,
            ReviewError::NotFound | ReviewError::UnknownListing => StatusCode::NOT_FOUND,
            ReviewError::Auth(err) => err.status(),
            ReviewError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
}

impl ReviewService {
    pub fn new(
        reviews: Arc<dyn ReviewRepository>,
        listings: Arc<dyn ListingRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            reviews,
            listings,
            users,
        }
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn list(&self, listing: Option<&ListingId>) -> Result<Vec<ReviewView>, ReviewError> {
        let reviews = match listing {
            Some(listing) => self.reviews.list_for_listing(listing)?,
            None => self.reviews.list()?,
        };
        Ok(reviews.into_iter().map(ReviewView::from).collect())
    }

    pub fn get(&self, id: &ReviewId) -> Result<ReviewView, ReviewError> {
        let review = self.reviews.fetch(id)?.ok_or(ReviewError::NotFound)?;
        Ok(review.into())
    }

    pub fn create(
        &self,
        reviewer: &UserId,
        request: CreateReviewRequest,
    ) -> Result<ReviewView, ReviewError> {
        if !(1..=5).contains(&request.rating) {
            return Err(ReviewError::InvalidRating);
        }

        let listing_id = ListingId(request.listing_id);
        if self.listings.fetch(&listing_id)?.is_none() {
            return Err(ReviewError::UnknownListing);
        }

        let review = Review {
            review_id: next_review_id(),
            listing: listing_id,
            reviewer: reviewer.clone(),
            rating: request.rating,
            comment: request.comment,
            created_at: Utc::now(),
        };
        let stored = self.reviews.insert(review)?;
        Ok(stored.into())
    }
}

pub fn reviews_router(service: Arc<ReviewService>) -> Router {
    Router::new()
        .route("/api/reviews", get(list_reviews).post(create_review))
        .route("/api/reviews/:review_id", get(get_review))
        .with_state(service)
}

async fn list_reviews(
    State(service): State<Arc<ReviewService>>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Vec<ReviewView>>, ReviewError> {
    let listing = query.listing_id.map(ListingId);
    Ok(Json(service.list(listing.as_ref())?))
}

async fn get_review(
    State(service): State<Arc<ReviewService>>,
    Path(review_id): Path<String>,
) -> Result<Json<ReviewView>, ReviewError> {
    Ok(Json(service.get(&ReviewId(review_id))?))
}

async fn create_review(
    State(service): State<Arc<ReviewService>>,
    headers: HeaderMap,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewView>), ReviewError> {
    let user = authenticate(service.users(), &headers)?;
    let view = service.create(&user.user_id, request)?;
    Ok((StatusCode::CREATED, Json(view)))
}
