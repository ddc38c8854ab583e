use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::bookings::BookingResponse;
use crate::models::PaymentStatus;
use crate::services::booking::{self, ConfirmPaymentInput};
use crate::services::notify;
use crate::state::AppState;

// POST /api/payments/create-order
#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub booking_id: String,
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    pub booking: BookingResponse,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let user = auth::require_user(&state, &headers)?;

    let (updated, order) = booking::initiate_payment(&state, &body.booking_id, &user).await?;

    Ok(Json(CreateOrderResponse {
        order: OrderResponse {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
        },
        booking: BookingResponse::from_booking(&updated, Utc::now().naive_utc()),
    }))
}

// POST /api/payments/verify
#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub booking_id: String,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Serialize)]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    pub booking: BookingResponse,
}

pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let user = auth::require_user(&state, &headers)?;

    let input = ConfirmPaymentInput {
        booking_id: body.booking_id,
        order_id: body.order_id,
        payment_id: body.payment_id,
        signature: body.signature,
    };

    let (confirmed, newly_paid) = {
        let db = state.db.lock().unwrap();
        booking::confirm_payment(&db, &state.config.razorpay_key_secret, &user, &input)?
    };

    // The confirmation email must never block or fail this response.
    if newly_paid {
        tokio::spawn(notify::send_booking_confirmation(
            state.clone(),
            confirmed.id.clone(),
        ));
    }

    Ok(Json(VerifyPaymentResponse {
        verified: true,
        booking: BookingResponse::from_booking(&confirmed, Utc::now().naive_utc()),
    }))
}

// GET /api/payments/status/:booking_id
#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub payment_status: String,
    pub booking_status: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_status: Option<String>,
}

pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let user = auth::require_user(&state, &headers)?;

    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking(&db, &booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    if booking.user_id != user.id && !user.role.is_admin() {
        return Err(AppError::Forbidden(
            "not authorized for this booking".to_string(),
        ));
    }

    // Best effort: while a payment is in flight, report the gateway's view too.
    let gateway_status = match (&booking.payment_id, booking.payment_status) {
        (Some(payment_id), PaymentStatus::Processing) => state
            .payments
            .fetch_payment(payment_id)
            .await
            .map(|p| p.status)
            .ok(),
        _ => None,
    };

    Ok(Json(PaymentStatusResponse {
        payment_status: booking.payment_status.as_str().to_string(),
        booking_status: booking.status.as_str().to_string(),
        order_id: booking.order_id.clone(),
        payment_id: booking.payment_id.clone(),
        expired: booking.is_expired(Utc::now().naive_utc()),
        gateway_status,
    }))
}

// POST /api/payments/webhook — unauthenticated, gated by the body signature
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers
        .get("x-razorpay-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let applied = {
        let db = state.db.lock().unwrap();
        booking::handle_webhook_event(
            &db,
            &state.config.razorpay_webhook_secret,
            &body,
            signature,
        )?
    };

    if let Some(confirmed) = applied {
        tokio::spawn(notify::send_booking_confirmation(
            state.clone(),
            confirmed.id,
        ));
    }

    Ok(Json(serde_json::json!({ "received": true })))
}
