use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use rentwheels::config::AppConfig;
use rentwheels::db;
use rentwheels::routes;
use rentwheels::services::mail::sendgrid::SendgridMailer;
use rentwheels::services::payments::razorpay::RazorpayProvider;
use rentwheels::state::{AppState, OwnerContact};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let payments = RazorpayProvider::new(
        config.razorpay_key_id.clone(),
        config.razorpay_key_secret.clone(),
    );
    let mailer = SendgridMailer::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    );
    let owner = OwnerContact::from_config(&config);

    if owner.upi_id.is_empty() {
        tracing::warn!("OWNER_UPI_ID not configured, manual payment instructions will be empty");
    }

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        payments: Box::new(payments),
        mailer: Box::new(mailer),
        owner,
    });

    let app = routes::api_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
