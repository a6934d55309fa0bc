//! Core records for the booking platform: users, listings, bookings, reviews,
//! and payments. Identifiers are process-local sequences; records are plain
//! data moved through the repository traits in [`crate::repository`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

static USER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static LISTING_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static BOOKING_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static REVIEW_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence(prefix: &str, sequence: &AtomicU64) -> String {
    let id = sequence.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

pub fn next_user_id() -> UserId {
    UserId(next_sequence("usr", &USER_SEQUENCE))
}

pub fn next_listing_id() -> ListingId {
    ListingId(next_sequence("lst", &LISTING_SEQUENCE))
}

pub fn next_booking_id() -> BookingId {
    BookingId(next_sequence("bkg", &BOOKING_SEQUENCE))
}

pub fn next_review_id() -> ReviewId {
    ReviewId(next_sequence("rev", &REVIEW_SEQUENCE))
}

pub fn next_payment_id() -> PaymentId {
    PaymentId(next_sequence("pay", &PAYMENT_SEQUENCE))
}

/// Account referenced by listings (as host) and bookings (as guest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_staff: bool,
}

impl User {
    /// Display name used in payer fields and notification bodies.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let trimmed = name.trim();
        if trimmed.is_empty() {
            "Guest".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// A bookable property owned by a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub listing_id: ListingId,
    pub host: UserId,
    pub name: String,
    pub description: String,
    pub location: String,
    /// Nightly price in whole currency units.
    pub price_per_night: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// A reservation of a listing for a date range.
///
/// Invariant: `start_date < end_date`, enforced at creation by the booking
/// service. Status is mutated only by payment verification (to `Confirmed`)
/// or the cancellation flow (to `Cancelled`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub listing: ListingId,
    pub guest: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Nights multiplied by the listing's nightly price at booking time.
    pub total_price: u32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Whole nights between two dates; negative when the range is reversed.
pub fn nights_between(start_date: NaiveDate, end_date: NaiveDate) -> i64 {
    (end_date - start_date).num_days()
}

/// Guest feedback on a listing; immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: ReviewId,
    pub listing: ListingId,
    pub reviewer: UserId,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Chapa,
}

/// Monetary transaction tied to a booking, reconciled against the gateway.
///
/// Payments are never deleted; failed and completed records remain as an
/// audit trail. Payer fields are populated when the payment is initialized
/// with the gateway, and the raw gateway payload is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub booking: BookingId,
    pub amount: u32,
    pub currency: String,
    pub payer_email: Option<String>,
    pub payer_phone: Option<String>,
    pub payer_name: Option<String>,
    /// Reference sent to the gateway; doubles as the webhook correlation key.
    pub tx_ref: String,
    pub checkout_url: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
