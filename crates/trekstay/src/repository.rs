//! Storage abstractions so each service can be exercised in isolation.
//!
//! One trait per entity, mirroring the per-request data access the services
//! need. Production wiring supplies `Mutex<HashMap>` implementations; tests
//! substitute scripted fakes.

use crate::domain::{
    Booking, BookingId, Listing, ListingId, Payment, PaymentId, PaymentStatus, Review, ReviewId,
    User, UserId,
};

/// Error enumeration shared by all repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub trait UserRepository: Send + Sync {
    fn insert(&self, user: User) -> Result<User, RepositoryError>;
    fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
}

pub trait ListingRepository: Send + Sync {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError>;
    fn update(&self, listing: Listing) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
    fn delete(&self, id: &ListingId) -> Result<(), RepositoryError>;
    fn list(&self) -> Result<Vec<Listing>, RepositoryError>;
}

pub trait BookingRepository: Send + Sync {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError>;
    fn update(&self, booking: Booking) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;
    fn list(&self) -> Result<Vec<Booking>, RepositoryError>;
}

pub trait ReviewRepository: Send + Sync {
    fn insert(&self, review: Review) -> Result<Review, RepositoryError>;
    fn fetch(&self, id: &ReviewId) -> Result<Option<Review>, RepositoryError>;
    fn list(&self) -> Result<Vec<Review>, RepositoryError>;

    fn list_for_listing(&self, listing: &ListingId) -> Result<Vec<Review>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|review| &review.listing == listing)
            .collect())
    }
}

pub trait PaymentRepository: Send + Sync {
    fn insert(&self, payment: Payment) -> Result<Payment, RepositoryError>;
    fn update(&self, payment: Payment) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError>;
    fn list(&self) -> Result<Vec<Payment>, RepositoryError>;

    fn find_by_tx_ref(&self, tx_ref: &str) -> Result<Option<Payment>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|payment| payment.tx_ref == tx_ref))
    }

    /// A booking's "active" payment is any record that has not failed.
    /// Application-level convention only; nothing guards concurrent inserts.
    fn find_active_for_booking(
        &self,
        booking: &BookingId,
    ) -> Result<Option<Payment>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|payment| &payment.booking == booking && payment.status != PaymentStatus::Failed))
    }
}
