//! Payment lifecycle: creation, gateway initialization, verification, the
//! redirect landing view, and the gateway webhook.
//!
//! Reachable status transitions through the public API:
//! `PENDING -> FAILED` when initialization fails, `PENDING -> COMPLETED`
//! when verification succeeds (which also confirms the booking). FAILED and
//! COMPLETED are terminal on the verify/webhook path; an unsettled
//! verification leaves the payment untouched, and nothing serializes
//! concurrent verify calls on one payment.

pub mod gateway;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::auth::{authenticate, AuthError};
use crate::domain::{
    next_payment_id, Booking, BookingId, BookingStatus, Payment, PaymentId, PaymentMethod,
    PaymentStatus, User,
};
use crate::notifications::{NotificationJob, NotificationQueue};
use crate::repository::{
    BookingRepository, PaymentRepository, RepositoryError, UserRepository,
};
use gateway::{InitializeRequest, PaymentGateway};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: String,
}

/// Gateway webhook body; only the correlation reference matters, the local
/// verify call is the authority on settlement.
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub tx_ref: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub amount: u32,
    pub currency: String,
    pub tx_ref: String,
    pub checkout_url: Option<String>,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentView {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.payment_id,
            booking_id: payment.booking,
            amount: payment.amount,
            currency: payment.currency,
            tx_ref: payment.tx_ref,
            checkout_url: payment.checkout_url,
            status: payment.status,
            payment_method: payment.payment_method,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InitializeView {
    pub checkout_url: String,
    pub tx_ref: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyView {
    pub verified: bool,
    pub payment: PaymentView,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment not found")]
    NotFound,
    #[error("booking not found")]
    UnknownBooking,
    #[error("booking guest record missing")]
    MissingGuest,
    #[error("booking already has an active payment")]
    DuplicatePayment,
    #[error("payment is not awaiting initialization")]
    NotPending,
    #[error("not authorized to view this payment")]
    Forbidden,
    #[error("payment gateway error: {0}")]
    Gateway(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = match &self {
            PaymentError::NotFound | PaymentError::UnknownBooking => StatusCode::NOT_FOUND,
            PaymentError::DuplicatePayment => StatusCode::CONFLICT,
            PaymentError::NotPending => StatusCode::BAD_REQUEST,
            PaymentError::Forbidden => StatusCode::FORBIDDEN,
            PaymentError::Auth(err) => err.status(),
            PaymentError::Gateway(_)
            | PaymentError::MissingGuest
            | PaymentError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Error text goes to the client verbatim, gateway detail included.
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// URL construction inputs shared by initialize calls.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub public_base_url: String,
    pub currency: String,
}

pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    bookings: Arc<dyn BookingRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifications: Arc<dyn NotificationQueue>,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        bookings: Arc<dyn BookingRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifications: Arc<dyn NotificationQueue>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            payments,
            bookings,
            users,
            gateway,
            notifications,
            settings,
        }
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    fn booking_for(&self, payment: &Payment) -> Result<Booking, PaymentError> {
        self.bookings
            .fetch(&payment.booking)?
            .ok_or(PaymentError::UnknownBooking)
    }

    /// Queryset semantics from the source: payments belonging to other users
    /// simply do not exist for non-staff callers.
    fn visible_to(&self, caller: &User, payment: &Payment) -> Result<bool, PaymentError> {
        if caller.is_staff {
            return Ok(true);
        }
        let booking = self.booking_for(payment)?;
        Ok(booking.guest == caller.user_id)
    }

    pub fn list(&self, caller: &User) -> Result<Vec<PaymentView>, PaymentError> {
        let mut views = Vec::new();
        for payment in self.payments.list()? {
            if self.visible_to(caller, &payment)? {
                views.push(payment.into());
            }
        }
        Ok(views)
    }

    pub fn get(&self, caller: &User, id: &PaymentId) -> Result<PaymentView, PaymentError> {
        let payment = self.payments.fetch(id)?.ok_or(PaymentError::NotFound)?;
        if !self.visible_to(caller, &payment)? {
            return Err(PaymentError::NotFound);
        }
        Ok(payment.into())
    }

    /// Create a pending payment for a booking. One active (non-failed)
    /// payment per booking, enforced by convention only: nothing guards two
    /// concurrent creates racing past the lookup.
    pub fn create(
        &self,
        caller: &User,
        request: CreatePaymentRequest,
    ) -> Result<PaymentView, PaymentError> {
        let booking_id = BookingId(request.booking_id);
        let booking = self
            .bookings
            .fetch(&booking_id)?
            .ok_or(PaymentError::UnknownBooking)?;
        if !caller.is_staff && booking.guest != caller.user_id {
            return Err(PaymentError::UnknownBooking);
        }

        if self.payments.find_active_for_booking(&booking_id)?.is_some() {
            return Err(PaymentError::DuplicatePayment);
        }

        let now = Utc::now();
        let payment_id = next_payment_id();
        let payment = Payment {
            tx_ref: payment_id.0.clone(),
            payment_id,
            booking: booking_id,
            amount: booking.total_price,
            currency: self.settings.currency.clone(),
            payer_email: None,
            payer_phone: None,
            payer_name: None,
            checkout_url: None,
            gateway_response: None,
            status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Chapa,
            created_at: now,
            updated_at: now,
        };
        let stored = self.payments.insert(payment)?;
        Ok(stored.into())
    }

    /// Initialize the hosted checkout for a pending payment.
    ///
    /// On gateway failure the payment is marked FAILED before the error is
    /// returned; there is no retry and no transient/permanent distinction.
    pub async fn initialize(
        &self,
        caller: &User,
        id: &PaymentId,
    ) -> Result<InitializeView, PaymentError> {
        let mut payment = self.payments.fetch(id)?.ok_or(PaymentError::NotFound)?;
        if !self.visible_to(caller, &payment)? {
            return Err(PaymentError::NotFound);
        }
        if payment.status != PaymentStatus::Pending {
            return Err(PaymentError::NotPending);
        }

        let booking = self.booking_for(&payment)?;
        let guest = self
            .users
            .fetch(&booking.guest)?
            .ok_or(PaymentError::MissingGuest)?;

        let first_name = if guest.first_name.trim().is_empty() {
            "Guest".to_string()
        } else {
            guest.first_name.clone()
        };
        let last_name = if guest.last_name.trim().is_empty() {
            "User".to_string()
        } else {
            guest.last_name.clone()
        };

        let base = self.settings.public_base_url.trim_end_matches('/');
        let request = InitializeRequest {
            amount: payment.amount.to_string(),
            currency: payment.currency.clone(),
            email: guest.email.clone(),
            first_name,
            last_name,
            phone_number: guest.phone.clone(),
            tx_ref: payment.tx_ref.clone(),
            callback_url: format!("{base}/api/chapa-webhook"),
            return_url: format!("{base}/api/payments/{}/complete", payment.payment_id.0),
        };

        match self.gateway.initialize(request).await {
            Ok(outcome) => {
                payment.payer_email = Some(guest.email.clone());
                payment.payer_phone = guest.phone.clone();
                payment.payer_name = Some(guest.full_name());
                payment.checkout_url = Some(outcome.checkout_url.clone());
                payment.gateway_response = Some(outcome.raw);
                payment.updated_at = Utc::now();
                self.payments.update(payment.clone())?;

                self.dispatch(NotificationJob::CheckoutLink {
                    payment_id: payment.payment_id.clone(),
                    email: guest.email,
                    checkout_url: outcome.checkout_url.clone(),
                });

                Ok(InitializeView {
                    checkout_url: outcome.checkout_url,
                    tx_ref: payment.tx_ref,
                })
            }
            Err(err) => {
                payment.status = PaymentStatus::Failed;
                payment.updated_at = Utc::now();
                self.payments.update(payment)?;
                Err(PaymentError::Gateway(err.to_string()))
            }
        }
    }

    /// Ask the gateway whether the transaction settled; apply the COMPLETED /
    /// CONFIRMED pair of transitions when it did, change nothing when it did
    /// not.
    pub async fn verify(&self, caller: &User, id: &PaymentId) -> Result<VerifyView, PaymentError> {
        let payment = self.payments.fetch(id)?.ok_or(PaymentError::NotFound)?;
        if !self.visible_to(caller, &payment)? {
            return Err(PaymentError::NotFound);
        }

        self.reconcile(payment).await
    }

    /// Webhook entry point: correlate by tx_ref, then reconcile exactly like
    /// an explicit verify call.
    pub async fn handle_webhook(&self, tx_ref: &str) -> Result<VerifyView, PaymentError> {
        let payment = self
            .payments
            .find_by_tx_ref(tx_ref)?
            .ok_or(PaymentError::NotFound)?;
        self.reconcile(payment).await
    }

    async fn reconcile(&self, mut payment: Payment) -> Result<VerifyView, PaymentError> {
        // Only a pending payment may transition here; a failed or completed
        // record is terminal and the gateway is not consulted again.
        if payment.status != PaymentStatus::Pending {
            return Ok(VerifyView {
                verified: payment.status == PaymentStatus::Completed,
                payment: payment.into(),
            });
        }

        let outcome = self
            .gateway
            .verify(&payment.tx_ref)
            .await
            .map_err(|err| PaymentError::Gateway(err.to_string()))?;

        if !outcome.confirmed {
            return Ok(VerifyView {
                verified: false,
                payment: payment.into(),
            });
        }

        payment.status = PaymentStatus::Completed;
        payment.gateway_response = Some(outcome.raw);
        payment.updated_at = Utc::now();
        self.payments.update(payment.clone())?;

        let mut booking = self.booking_for(&payment)?;
        booking.status = BookingStatus::Confirmed;
        self.bookings.update(booking.clone())?;

        let email = match &payment.payer_email {
            Some(email) => email.clone(),
            None => self
                .users
                .fetch(&booking.guest)?
                .ok_or(PaymentError::MissingGuest)?
                .email,
        };
        self.dispatch(NotificationJob::PaymentConfirmation {
            payment_id: payment.payment_id.clone(),
            email,
            amount: payment.amount,
            currency: payment.currency.clone(),
        });

        Ok(VerifyView {
            verified: true,
            payment: payment.into(),
        })
    }

    /// Redirect landing after hosted checkout. Unlike the collection
    /// endpoints this surfaces an explicit 403 for other users' payments.
    pub fn complete(&self, caller: &User, id: &PaymentId) -> Result<PaymentView, PaymentError> {
        let payment = self.payments.fetch(id)?.ok_or(PaymentError::NotFound)?;
        if !self.visible_to(caller, &payment)? {
            return Err(PaymentError::Forbidden);
        }
        Ok(payment.into())
    }

    fn dispatch(&self, job: NotificationJob) {
        // A dropped email never fails or rolls back the payment transition.
        if let Err(err) = self.notifications.enqueue(job) {
            warn!(%err, "dropping payment notification");
        }
    }
}

pub fn payments_router(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/api/payments", get(list_payments).post(create_payment))
        .route("/api/payments/:payment_id", get(get_payment))
        .route(
            "/api/payments/:payment_id/initialize",
            post(initialize_payment),
        )
        .route("/api/payments/:payment_id/verify", get(verify_payment))
        .route("/api/payments/:payment_id/complete", get(complete_payment))
        .route("/api/chapa-webhook", post(chapa_webhook))
        .with_state(service)
}

async fn list_payments(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PaymentView>>, PaymentError> {
    let caller = authenticate(service.users(), &headers)?;
    Ok(Json(service.list(&caller)?))
}

async fn create_payment(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentView>), PaymentError> {
    let caller = authenticate(service.users(), &headers)?;
    let view = service.create(&caller, request)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_payment(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentView>, PaymentError> {
    let caller = authenticate(service.users(), &headers)?;
    Ok(Json(service.get(&caller, &PaymentId(payment_id))?))
}

async fn initialize_payment(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
    Path(payment_id): Path<String>,
) -> Result<Json<InitializeView>, PaymentError> {
    let caller = authenticate(service.users(), &headers)?;
    Ok(Json(
        service.initialize(&caller, &PaymentId(payment_id)).await?,
    ))
}

async fn verify_payment(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
    Path(payment_id): Path<String>,
) -> Result<Json<VerifyView>, PaymentError> {
    let caller = authenticate(service.users(), &headers)?;
    Ok(Json(
        service.verify(&caller, &PaymentId(payment_id)).await?,
    ))
}

async fn complete_payment(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentView>, PaymentError> {
    let caller = authenticate(service.users(), &headers)?;
    Ok(Json(service.complete(&caller, &PaymentId(payment_id))?))
}

async fn chapa_webhook(
    State(service): State<Arc<PaymentService>>,
    Json(request): Json<WebhookRequest>,
) -> Result<Json<VerifyView>, PaymentError> {
    Ok(Json(service.handle_webhook(&request.tx_ref).await?))
}
