use crate::infra::build_services;
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use serde_json::json;
use std::fmt::Display;
use std::sync::Arc;
use trekstay::bookings::CreateBookingRequest;
use trekstay::domain::{next_user_id, User};
use trekstay::error::AppError;
use trekstay::listings::CreateListingRequest;
use trekstay::notifications::{EmailMessage, MailError, Mailer, NotificationWorker};
use trekstay::payments::gateway::{
    GatewayError, InitializeOutcome, InitializeRequest, PaymentGateway, VerifyOutcome,
};
use trekstay::payments::{CreatePaymentRequest, PaymentSettings};
use trekstay::repository::UserRepository;
use trekstay::reviews::CreateReviewRequest;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Check-in date (YYYY-MM-DD). Defaults to a week from today.
    #[arg(long)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Check-out date (YYYY-MM-DD). Defaults to start_date + 3 nights.
    #[arg(long)]
    pub(crate) end_date: Option<NaiveDate>,
    /// Nightly rate for the demo listing, in whole currency units.
    #[arg(long, default_value_t = 120)]
    pub(crate) nightly_rate: u32,
    /// Simulate the gateway declining the checkout initialization.
    #[arg(long)]
    pub(crate) decline_payment: bool,
}

/// Walk the whole guest journey offline: list a property, book it, pay
/// through a scripted gateway, and leave a review. No network calls.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start_date = args
        .start_date
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(7));
    let end_date = args.end_date.unwrap_or(start_date + Duration::days(3));

    let gateway = Arc::new(OfflineGateway {
        decline: args.decline_payment,
    });
    let settings = PaymentSettings {
        public_base_url: "http://127.0.0.1:3000".to_string(),
        currency: "ETB".to_string(),
    };
    let (services, jobs) = build_services(gateway, settings);

    let host = services
        .users
        .insert(demo_user("host@trekstay.example", "Sara", "Bekele", false))
        .map_err(workflow)?;
    let guest = services
        .users
        .insert(demo_user("guest@trekstay.example", "Abel", "Tesfaye", false))
        .map_err(workflow)?;

    println!("TrekStay booking demo");
    println!("  host:  {} <{}>", host.full_name(), host.email);
    println!("  guest: {} <{}>", guest.full_name(), guest.email);

    let listing = services
        .listings
        .create(
            &host,
            CreateListingRequest {
                name: "Lakeside Cottage".to_string(),
                description: "Two-bedroom cottage on the shore of Lake Tana.".to_string(),
                location: "Bahir Dar".to_string(),
                price_per_night: args.nightly_rate,
            },
        )
        .map_err(workflow)?;
    println!(
        "\nListing {} published: {} in {} at {}/night",
        listing.listing_id.0, listing.name, listing.location, listing.price_per_night
    );

    let booking = services
        .bookings
        .create(
            &guest,
            CreateBookingRequest {
                listing_id: listing.listing_id.0.clone(),
                start_date,
                end_date,
            },
        )
        .map_err(workflow)?;
    println!(
        "Booking {} created: {} to {}, total {} ({:?})",
        booking.booking_id.0, booking.start_date, booking.end_date, booking.total_price,
        booking.status
    );

    let payment = services
        .payments
        .create(
            &guest,
            CreatePaymentRequest {
                booking_id: booking.booking_id.0.clone(),
            },
        )
        .map_err(workflow)?;
    println!(
        "Payment {} created for {} {} ({:?})",
        payment.payment_id.0, payment.amount, payment.currency, payment.status
    );

    match services.payments.initialize(&guest, &payment.payment_id).await {
        Ok(initialized) => {
            println!("Checkout ready at {}", initialized.checkout_url);

            let verified = services
                .payments
                .verify(&guest, &payment.payment_id)
                .await
                .map_err(workflow)?;
            println!(
                "Verification settled: payment {:?}, booking confirmed",
                verified.payment.status
            );

            let review = services
                .reviews
                .create(
                    &guest.user_id,
                    CreateReviewRequest {
                        listing_id: listing.listing_id.0.clone(),
                        rating: 5,
                        comment: "Quiet, clean, and right on the water.".to_string(),
                    },
                )
                .map_err(workflow)?;
            println!(
                "Review {} left on {}: {}/5",
                review.review_id.0, listing.name, review.rating
            );
        }
        Err(err) => {
            println!("Checkout initialization failed: {err}");
            let failed = services
                .payments
                .get(&guest, &payment.payment_id)
                .map_err(workflow)?;
            println!("Payment {} is now {:?}", failed.payment_id.0, failed.status);
        }
    }

    // Dropping the services drops every queue sender, so the worker drains
    // the remaining jobs and exits.
    drop(services);
    println!("\nNotification worker output:");
    NotificationWorker::new(Arc::new(ConsoleMailer), jobs)
        .run()
        .await;

    Ok(())
}

fn workflow(err: impl Display) -> AppError {
    AppError::Workflow(err.to_string())
}

fn demo_user(email: &str, first_name: &str, last_name: &str, is_staff: bool) -> User {
    User {
        user_id: next_user_id(),
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        phone: Some("+251911000000".to_string()),
        is_staff,
    }
}

/// Gateway double for offline demos. Settles every transaction unless built
/// with `decline`, in which case initialization is rejected.
struct OfflineGateway {
    decline: bool,
}

#[async_trait::async_trait]
impl PaymentGateway for OfflineGateway {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializeOutcome, GatewayError> {
        if self.decline {
            return Err(GatewayError::Declined(
                "demo gateway configured to decline".to_string(),
            ));
        }
        let checkout_url = format!("https://checkout.chapa.co/checkout/pay/{}", request.tx_ref);
        Ok(InitializeOutcome {
            checkout_url: checkout_url.clone(),
            raw: json!({
                "status": "success",
                "message": "Hosted Link",
                "data": { "checkout_url": checkout_url },
            }),
        })
    }

    async fn verify(&self, tx_ref: &str) -> Result<VerifyOutcome, GatewayError> {
        Ok(VerifyOutcome {
            confirmed: true,
            raw: json!({
                "status": "success",
                "message": "Payment details",
                "data": { "status": "success", "tx_ref": tx_ref },
            }),
        })
    }
}

/// Prints each outbound email instead of sending it.
struct ConsoleMailer;

impl Mailer for ConsoleMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        println!("  -> {}: {}", message.to, message.subject);
        Ok(())
    }
}
