//! In-memory repositories backing the service binary, the demo command, and
//! the test suites. Nothing here survives a restart; payments are still never
//! removed so the audit-trail contract holds within a process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{
    Booking, BookingId, Listing, ListingId, Payment, PaymentId, Review, ReviewId, User, UserId,
};
use crate::repository::{
    BookingRepository, ListingRepository, PaymentRepository, RepositoryError, ReviewRepository,
    UserRepository,
};

#[derive(Default, Clone)]
pub struct InMemoryUserRepository {
    records: Arc<Mutex<HashMap<UserId, User>>>,
}

impl UserRepository for InMemoryUserRepository {
    fn insert(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.records.lock().expect("user mutex poisoned");
        if guard.contains_key(&user.user_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(user.user_id.clone(), user.clone());
        Ok(user)
    }

    fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let guard = self.records.lock().expect("user mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryListingRepository {
    records: Arc<Mutex<HashMap<ListingId, Listing>>>,
}

impl ListingRepository for InMemoryListingRepository {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        let mut guard = self.records.lock().expect("listing mutex poisoned");
        if guard.contains_key(&listing.listing_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(listing.listing_id.clone(), listing.clone());
        Ok(listing)
    }

    fn update(&self, listing: Listing) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("listing mutex poisoned");
        if guard.contains_key(&listing.listing_id) {
            guard.insert(listing.listing_id.clone(), listing);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn delete(&self, id: &ListingId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("listing mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn list(&self) -> Result<Vec<Listing>, RepositoryError> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        let mut listings: Vec<Listing> = guard.values().cloned().collect();
        listings.sort_by(|a, b| a.listing_id.0.cmp(&b.listing_id.0));
        Ok(listings)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryBookingRepository {
    records: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl BookingRepository for InMemoryBookingRepository {
    fn insert(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        let mut guard = self.records.lock().expect("booking mutex poisoned");
        if guard.contains_key(&booking.booking_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(booking.booking_id.clone(), booking.clone());
        Ok(booking)
    }

    fn update(&self, booking: Booking) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("booking mutex poisoned");
        if guard.contains_key(&booking.booking_id) {
            guard.insert(booking.booking_id.clone(), booking);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let guard = self.records.lock().expect("booking mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Booking>, RepositoryError> {
        let guard = self.records.lock().expect("booking mutex poisoned");
        let mut bookings: Vec<Booking> = guard.values().cloned().collect();
        bookings.sort_by(|a, b| a.booking_id.0.cmp(&b.booking_id.0));
        Ok(bookings)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryReviewRepository {
    records: Arc<Mutex<HashMap<ReviewId, Review>>>,
}

impl ReviewRepository for InMemoryReviewRepository {
    fn insert(&self, review: Review) -> Result<Review, RepositoryError> {
        let mut guard = self.records.lock().expect("review mutex poisoned");
        if guard.contains_key(&review.review_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(review.review_id.clone(), review.clone());
        Ok(review)
    }

    fn fetch(&self, id: &ReviewId) -> Result<Option<Review>, RepositoryError> {
        let guard = self.records.lock().expect("review mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Review>, RepositoryError> {
        let guard = self.records.lock().expect("review mutex poisoned");
        let mut reviews: Vec<Review> = guard.values().cloned().collect();
        reviews.sort_by(|a, b| a.review_id.0.cmp(&b.review_id.0));
        Ok(reviews)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPaymentRepository {
    records: Arc<Mutex<HashMap<PaymentId, Payment>>>,
}

impl PaymentRepository for InMemoryPaymentRepository {
    fn insert(&self, payment: Payment) -> Result<Payment, RepositoryError> {
        let mut guard = self.records.lock().expect("payment mutex poisoned");
        if guard.contains_key(&payment.payment_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(payment.payment_id.clone(), payment.clone());
        Ok(payment)
    }

    fn update(&self, payment: Payment) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("payment mutex poisoned");
        if guard.contains_key(&payment.payment_id) {
            guard.insert(payment.payment_id.clone(), payment);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let guard = self.records.lock().expect("payment mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Payment>, RepositoryError> {
        let guard = self.records.lock().expect("payment mutex poisoned");
        let mut payments: Vec<Payment> = guard.values().cloned().collect();
        payments.sort_by(|a, b| a.payment_id.0.cmp(&b.payment_id.0));
        Ok(payments)
    }
}
