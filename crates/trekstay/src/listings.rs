//! Property listings: host-owned CRUD with embedded reviews on reads.
//!
//! Reads are public; writes require an authenticated host, and only the
//! owning host may update or delete a listing.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{authenticate, AuthError};
use crate::domain::{next_listing_id, Listing, ListingId, User, UserId};
use crate::repository::{ListingRepository, RepositoryError, ReviewRepository, UserRepository};
use crate::reviews::ReviewView;

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub name: String,
    pub description: String,
    pub location: String,
    pub price_per_night: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub name: String,
    pub description: String,
    pub location: String,
    pub price_per_night: u32,
}

#[derive(Debug, Serialize)]
pub struct ListingView {
    pub listing_id: ListingId,
    pub host: UserId,
    pub name: String,
    pub description: String,
    pub location: String,
    pub price_per_night: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviews: Vec<ReviewView>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("listing not found")]
    NotFound,
    #[error("only the host may modify this listing")]
    Forbidden,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl IntoResponse for ListingError {
    fn into_response(self) -> Response {
        let status = match &self {
            ListingError::NotFound => StatusCode::NOT_FOUND,
            ListingError::Forbidden => StatusCode::FORBIDDEN,
            ListingError::Auth(err) => err.status(),
            ListingError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub struct ListingService {
    listings: Arc<dyn ListingRepository>,
    reviews: Arc<dyn ReviewRepository>,
    users: Arc<dyn UserRepository>,
}

impl ListingService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        reviews: Arc<dyn ReviewRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            listings,
            reviews,
            users,
        }
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    fn view(&self, listing: Listing) -> Result<ListingView, ListingError> {
        let reviews = self
            .reviews
            .list_for_listing(&listing.listing_id)?
            .into_iter()
            .map(ReviewView::from)
            .collect();
        Ok(ListingView {
            listing_id: listing.listing_id,
            host: listing.host,
            name: listing.name,
            description: listing.description,
            location: listing.location,
            price_per_night: listing.price_per_night,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
            reviews,
        })
    }

    pub fn list(&self) -> Result<Vec<ListingView>, ListingError> {
        self.listings
            .list()?
            .into_iter()
            .map(|listing| self.view(listing))
            .collect()
    }

    pub fn get(&self, id: &ListingId) -> Result<ListingView, ListingError> {
        let listing = self.listings.fetch(id)?.ok_or(ListingError::NotFound)?;
        self.view(listing)
    }

    pub fn create(
        &self,
        host: &User,
        request: CreateListingRequest,
    ) -> Result<ListingView, ListingError> {
        let now = Utc::now();
        let listing = Listing {
            listing_id: next_listing_id(),
            host: host.user_id.clone(),
            name: request.name,
            description: request.description,
            location: request.location,
            price_per_night: request.price_per_night,
            created_at: now,
            updated_at: now,
        };
        let stored = self.listings.insert(listing)?;
        self.view(stored)
    }

    pub fn update(
        &self,
        caller: &User,
        id: &ListingId,
        request: UpdateListingRequest,
    ) -> Result<ListingView, ListingError> {
        let mut listing = self.listings.fetch(id)?.ok_or(ListingError::NotFound)?;
        if listing.host != caller.user_id {
            return Err(ListingError::Forbidden);
        }

        listing.name = request.name;
        listing.description = request.description;
        listing.location = request.location;
        listing.price_per_night = request.price_per_night;
        listing.updated_at = Utc::now();

        self.listings.update(listing.clone())?;
        self.view(listing)
    }

    pub fn delete(&self, caller: &User, id: &ListingId) -> Result<(), ListingError> {
        let listing = self.listings.fetch(id)?.ok_or(ListingError::NotFound)?;
        if listing.host != caller.user_id {
            return Err(ListingError::Forbidden);
        }
        self.listings.delete(id)?;
        Ok(())
    }
}

pub fn listings_router(service: Arc<ListingService>) -> Router {
    Router::new()
        .route("/api/listings", get(list_listings).post(create_listing))
        .route(
            "/api/listings/:listing_id",
            get(get_listing).put(update_listing).delete(delete_listing),
        )
        .with_state(service)
}

async fn list_listings(
    State(service): State<Arc<ListingService>>,
) -> Result<Json<Vec<ListingView>>, ListingError> {
    Ok(Json(service.list()?))
}

async fn get_listing(
    State(service): State<Arc<ListingService>>,
    Path(listing_id): Path<String>,
) -> Result<Json<ListingView>, ListingError> {
    Ok(Json(service.get(&ListingId(listing_id))?))
}

async fn create_listing(
    State(service): State<Arc<ListingService>>,
    headers: HeaderMap,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<ListingView>), ListingError> {
    let host = authenticate(service.users(), &headers)?;
    let view = service.create(&host, request)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_listing(
    State(service): State<Arc<ListingService>>,
    headers: HeaderMap,
    Path(listing_id): Path<String>,
    Json(request): Json<UpdateListingRequest>,
) -> Result<Json<ListingView>, ListingError> {
    let caller = authenticate(service.users(), &headers)?;
    Ok(Json(service.update(
        &caller,
        &ListingId(listing_id),
        request,
    )?))
}

async fn delete_listing(
    State(service): State<Arc<ListingService>>,
    headers: HeaderMap,
    Path(listing_id): Path<String>,
) -> Result<StatusCode, ListingError> {
    let caller = authenticate(service.users(), &headers)?;
    service.delete(&caller, &ListingId(listing_id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::next_user_id;
    use crate::memory::{
        InMemoryListingRepository, InMemoryReviewRepository, InMemoryUserRepository,
    };

    struct Fixture {
        service: Arc<ListingService>,
        host: User,
        other: User,
    }

    fn fixture() -> Fixture {
        let listings = Arc::new(InMemoryListingRepository::default());
        let reviews = Arc::new(InMemoryReviewRepository::default());
        let users = Arc::new(InMemoryUserRepository::default());

        let host = users
            .insert(User {
                user_id: next_user_id(),
                email: "host@example.com".to_string(),
                first_name: "Hana".to_string(),
                last_name: "Bekele".to_string(),
                phone: None,
                is_staff: false,
            })
            .expect("insert host");
        let other = users
            .insert(User {
                user_id: next_user_id(),
                email: "other@example.com".to_string(),
                first_name: "Sara".to_string(),
                last_name: "Alemu".to_string(),
                phone: None,
                is_staff: false,
            })
            .expect("insert other");

        Fixture {
            service: Arc::new(ListingService::new(listings, reviews, users)),
            host,
            other,
        }
    }

    fn create_request() -> CreateListingRequest {
        CreateListingRequest {
            name: "Lakeside Cottage".to_string(),
            description: "Quiet cottage by the lake".to_string(),
            location: "Bahir Dar".to_string(),
            price_per_night: 100,
        }
    }

    #[test]
    fn create_assigns_host_and_timestamps() {
        let fixture = fixture();
        let view = fixture
            .service
            .create(&fixture.host, create_request())
            .expect("create listing");

        assert_eq!(view.host, fixture.host.user_id);
        assert!(view.listing_id.0.starts_with("lst-"));
        assert!(view.reviews.is_empty());
    }

    #[test]
    fn update_is_host_only() {
        let fixture = fixture();
        let view = fixture
            .service
            .create(&fixture.host, create_request())
            .expect("create listing");

        let request = UpdateListingRequest {
            name: "Lakeside Cottage".to_string(),
            description: "Now with a dock".to_string(),
            location: "Bahir Dar".to_string(),
            price_per_night: 120,
        };

        match fixture.service.update(
            &fixture.other,
            &view.listing_id,
            UpdateListingRequest {
                name: request.name.clone(),
                description: request.description.clone(),
                location: request.location.clone(),
                price_per_night: request.price_per_night,
            },
        ) {
            Err(ListingError::Forbidden) => {}
            other => panic!("expected forbidden, got {other:?}"),
        }

        let updated = fixture
            .service
            .update(&fixture.host, &view.listing_id, request)
            .expect("host updates");
        assert_eq!(updated.price_per_night, 120);
        assert!(updated.updated_at >= view.updated_at);
    }

    #[test]
    fn delete_is_host_only_and_removes_listing() {
        let fixture = fixture();
        let view = fixture
            .service
            .create(&fixture.host, create_request())
            .expect("create listing");

        match fixture.service.delete(&fixture.other, &view.listing_id) {
            Err(ListingError::Forbidden) => {}
            other => panic!("expected forbidden, got {other:?}"),
        }

        fixture
            .service
            .delete(&fixture.host, &view.listing_id)
            .expect("host deletes");
        match fixture.service.get(&view.listing_id) {
            Err(ListingError::NotFound) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn get_unknown_listing_is_not_found() {
        let fixture = fixture();
        match fixture.service.get(&ListingId("lst-999999".to_string())) {
            Err(ListingError::NotFound) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
