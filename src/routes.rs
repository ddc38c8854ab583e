use std::sync::Arc;

use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        // auth
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/request-otp", post(handlers::auth::request_otp))
        .route("/api/auth/verify-otp", post(handlers::auth::verify_otp))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/profile", put(handlers::auth::update_profile))
        // cars
        .route("/api/cars", get(handlers::cars::list_cars).post(handlers::cars::create_car))
        .route(
            "/api/cars/:id",
            get(handlers::cars::get_car)
                .put(handlers::cars::update_car)
                .delete(handlers::cars::delete_car),
        )
        .route(
            "/api/cars/:id/check-availability",
            post(handlers::cars::check_availability),
        )
        // bookings
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/my", get(handlers::bookings::my_bookings))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/cancel",
            put(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/verify-payment",
            post(handlers::bookings::verify_payment),
        )
        .route(
            "/api/bookings/:id/confirm-payment",
            put(handlers::bookings::confirm_payment),
        )
        // payments
        .route(
            "/api/payments/create-order",
            post(handlers::payments::create_order),
        )
        .route("/api/payments/verify", post(handlers::payments::verify_payment))
        .route(
            "/api/payments/status/:booking_id",
            get(handlers::payments::payment_status),
        )
        .route("/api/payments/webhook", post(handlers::payments::webhook))
        // admin
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/bookings/:id",
            patch(handlers::admin::update_booking_status)
                .delete(handlers::admin::delete_booking),
        )
        .route("/api/admin/users", get(handlers::admin::get_users))
        .route(
            "/api/admin/users/:id",
            get(handlers::admin::get_user)
                .patch(handlers::admin::update_user)
                .delete(handlers::admin::delete_user),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
