use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use barberbook::clock::SystemClock;
use barberbook::config::AppConfig;
use barberbook::db;
use barberbook::handlers;
use barberbook::services::payments::paystack::PaystackProvider;
use barberbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(
        config.shop_open_hour < config.shop_close_hour,
        "SHOP_OPEN_HOUR must be before SHOP_CLOSE_HOUR"
    );
    if config.paystack_secret_key.is_empty() {
        tracing::warn!("PAYSTACK_SECRET_KEY not set, webhook signature checks disabled");
    }

    let conn = db::init_db(&config.database_url)?;

    let payments = PaystackProvider::new(config.paystack_secret_key.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        payments: Box::new(payments),
        clock: Box::new(SystemClock),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/services", get(handlers::services::list_services))
        .route("/api/services/:id", get(handlers::services::get_service))
        .route("/api/availability", get(handlers::bookings::get_availability))
        .route(
            "/api/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route("/api/checkout/init", post(handlers::checkout::init_checkout))
        .route(
            "/api/checkout/verify",
            post(handlers::checkout::verify_checkout),
        )
        .route("/webhook/paystack", post(handlers::webhook::paystack_webhook))
        .route("/api/admin/schedule", get(handlers::admin::get_schedule))
        .route("/api/admin/services", post(handlers::admin::create_service))
        .route(
            "/api/admin/appointments/:id/status",
            post(handlers::admin::set_appointment_status),
        )
        .route(
            "/api/admin/appointments/:id/cash-payment",
            post(handlers::admin::record_cash_payment),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
