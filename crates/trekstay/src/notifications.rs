//! Fire-and-forget notification dispatch.
//!
//! Request handlers enqueue jobs carrying identifiers and scalar payload
//! only; a worker task drains the queue, renders the email, and hands it to
//! a [`Mailer`]. Delivery is at-most-once with no ordering guarantee relative
//! to the HTTP response, and a failed send is reduced to a descriptive
//! outcome string rather than propagated.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

use crate::domain::{BookingId, PaymentId};

/// Background job payloads: identifier plus the scalars the template needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationJob {
    BookingConfirmation {
        booking_id: BookingId,
        email: String,
        listing_name: String,
    },
    CheckoutLink {
        payment_id: PaymentId,
        email: String,
        checkout_url: String,
    },
    PaymentConfirmation {
        payment_id: PaymentId,
        email: String,
        amount: u32,
        currency: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification queue closed")]
    QueueClosed,
}

/// Submission seam between request handlers and the worker pool.
pub trait NotificationQueue: Send + Sync {
    fn enqueue(&self, job: NotificationJob) -> Result<(), NotifyError>;
}

/// Outbound mail transport. The production implementation hands messages to
/// the relay configured by `DEFAULT_FROM_EMAIL`; tests record them.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Channel-backed queue handed to the services; the paired receiver feeds a
/// [`NotificationWorker`].
#[derive(Clone)]
pub struct ChannelNotificationQueue {
    sender: UnboundedSender<NotificationJob>,
}

impl NotificationQueue for ChannelNotificationQueue {
    fn enqueue(&self, job: NotificationJob) -> Result<(), NotifyError> {
        self.sender.send(job).map_err(|_| NotifyError::QueueClosed)
    }
}

pub fn notification_channel() -> (ChannelNotificationQueue, UnboundedReceiver<NotificationJob>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelNotificationQueue { sender }, receiver)
}

/// Drains the job queue until every sender is dropped.
pub struct NotificationWorker {
    mailer: Arc<dyn Mailer>,
    receiver: UnboundedReceiver<NotificationJob>,
}

impl NotificationWorker {
    pub fn new(mailer: Arc<dyn Mailer>, receiver: UnboundedReceiver<NotificationJob>) -> Self {
        Self { mailer, receiver }
    }

    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            let outcome = deliver(self.mailer.as_ref(), job);
            info!(%outcome, "notification job finished");
        }
    }
}

/// Execute one job, folding any send failure into the returned outcome.
pub fn deliver(mailer: &dyn Mailer, job: NotificationJob) -> String {
    match job {
        NotificationJob::BookingConfirmation {
            booking_id,
            email,
            listing_name,
        } => {
            let message = render_booking_confirmation(&booking_id, &email, &listing_name);
            match mailer.send(&message) {
                Ok(()) => format!("Confirmation email sent for booking {}", booking_id.0),
                Err(err) => format!("Error sending booking confirmation email: {err}"),
            }
        }
        NotificationJob::CheckoutLink {
            payment_id,
            email,
            checkout_url,
        } => {
            let message = render_checkout_link(&payment_id, &email, &checkout_url);
            match mailer.send(&message) {
                Ok(()) => format!("Checkout link sent for payment {}", payment_id.0),
                Err(err) => format!("Error sending checkout link email: {err}"),
            }
        }
        NotificationJob::PaymentConfirmation {
            payment_id,
            email,
            amount,
            currency,
        } => {
            let message = render_payment_confirmation(&payment_id, &email, amount, &currency);
            match mailer.send(&message) {
                Ok(()) => format!("Payment confirmation email sent to {email}"),
                Err(err) => format!("Error sending payment confirmation email: {err}"),
            }
        }
    }
}

fn render_booking_confirmation(
    booking_id: &BookingId,
    email: &str,
    listing_name: &str,
) -> EmailMessage {
    EmailMessage {
        to: email.to_string(),
        subject: format!("Booking Confirmation - {listing_name}"),
        body: format!(
            "Thank you for your booking!\n\n\
             Your booking (ID: {}) for {listing_name} has been received.\n\n\
             Thank you for choosing our service!",
            booking_id.0
        ),
    }
}

fn render_checkout_link(payment_id: &PaymentId, email: &str, checkout_url: &str) -> EmailMessage {
    EmailMessage {
        to: email.to_string(),
        subject: "Complete Your Payment".to_string(),
        body: format!(
            "Your payment (ID: {}) is ready.\n\n\
             Follow this link to complete checkout: {checkout_url}\n\n\
             Thank you for choosing our service!",
            payment_id.0
        ),
    }
}

fn render_payment_confirmation(
    payment_id: &PaymentId,
    email: &str,
    amount: u32,
    currency: &str,
) -> EmailMessage {
    EmailMessage {
        to: email.to_string(),
        subject: "Payment Confirmation".to_string(),
        body: format!(
            "Your payment of {currency} {amount} (transaction {}) has been confirmed.\n\n\
             Thank you for choosing our service!",
            payment_id.0
        ),
    }
}

/// Mailer that logs the handoff instead of speaking SMTP; delivery itself is
/// owned by an external relay.
#[derive(Debug, Default, Clone)]
pub struct LogMailer {
    pub from_address: String,
}

impl LogMailer {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            from = %self.from_address,
            to = %message.to,
            subject = %message.subject,
            "email handed to relay"
        );
        Ok(())
    }
}
