use crate::cli::ServeArgs;
use crate::infra::{build_services, AppState};
use crate::routes::with_platform_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use trekstay::config::AppConfig;
use trekstay::error::AppError;
use trekstay::notifications::{LogMailer, NotificationWorker};
use trekstay::payments::gateway::ChapaClient;
use trekstay::payments::PaymentSettings;
use trekstay::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let gateway = Arc::new(ChapaClient::new(&config.chapa)?);
    let settings = PaymentSettings {
        public_base_url: config.public_base_url.clone(),
        currency: config.chapa.currency.clone(),
    };
    let (services, jobs) = build_services(gateway, settings);

    let mailer = Arc::new(LogMailer::new(config.notifications.from_address.clone()));
    let worker = NotificationWorker::new(mailer, jobs);
    tokio::spawn(worker.run());

    let app = with_platform_routes(&services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "booking platform api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
