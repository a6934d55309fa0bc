use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use trekstay::bookings::BookingService;
use trekstay::listings::ListingService;
use trekstay::memory::{
    InMemoryBookingRepository, InMemoryListingRepository, InMemoryPaymentRepository,
    InMemoryReviewRepository, InMemoryUserRepository,
};
use trekstay::notifications::{notification_channel, NotificationJob};
use trekstay::payments::gateway::PaymentGateway;
use trekstay::payments::{PaymentService, PaymentSettings};
use trekstay::reviews::ReviewService;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Fully wired service graph over the in-memory stores, shared by the HTTP
/// server and the CLI demo.
pub(crate) struct Services {
    pub(crate) users: Arc<InMemoryUserRepository>,
    pub(crate) listings: Arc<ListingService>,
    pub(crate) reviews: Arc<ReviewService>,
    pub(crate) bookings: Arc<BookingService>,
    pub(crate) payments: Arc<PaymentService>,
}

/// Wire the service graph. The receiver half of the notification channel is
/// handed back separately so the caller decides where the worker runs.
pub(crate) fn build_services(
    gateway: Arc<dyn PaymentGateway>,
    settings: PaymentSettings,
) -> (Services, UnboundedReceiver<NotificationJob>) {
    let users = Arc::new(InMemoryUserRepository::default());
    let listing_store = Arc::new(InMemoryListingRepository::default());
    let booking_store = Arc::new(InMemoryBookingRepository::default());
    let review_store = Arc::new(InMemoryReviewRepository::default());
    let payment_store = Arc::new(InMemoryPaymentRepository::default());

    let (queue, jobs) = notification_channel();
    let queue = Arc::new(queue);

    let listings = Arc::new(ListingService::new(
        listing_store.clone(),
        review_store.clone(),
        users.clone(),
    ));
    let reviews = Arc::new(ReviewService::new(
        review_store,
        listing_store.clone(),
        users.clone(),
    ));
    let bookings = Arc::new(BookingService::new(
        booking_store.clone(),
        listing_store,
        users.clone(),
        queue.clone(),
    ));
    let payments = Arc::new(PaymentService::new(
        payment_store,
        booking_store,
        users.clone(),
        gateway,
        queue,
        settings,
    ));

    (
        Services {
            users,
            listings,
            reviews,
            bookings,
            payments,
        },
        jobs,
    )
}
