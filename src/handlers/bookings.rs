use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::Booking;
use crate::services::booking::{self, CreateBookingInput};
use crate::services::notify;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub user_id: String,
    pub car_id: String,
    pub start_date: String,
    pub end_date: String,
    pub total_days: i64,
    pub total_amount: i64,
    pub status: String,
    pub payment_status: String,
    pub payment_verified: bool,
    pub payment_deadline: Option<String>,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub payment_attempts: i64,
    pub payment_error: Option<String>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub owner_phone: String,
    pub owner_upi_id: String,
    /// Derived at read time, never persisted.
    pub expired: bool,
    pub created_at: String,
}

impl BookingResponse {
    pub fn from_booking(b: &Booking, now: NaiveDateTime) -> Self {
        Self {
            id: b.id.clone(),
            user_id: b.user_id.clone(),
            car_id: b.car_id.clone(),
            start_date: b.start_date.format("%Y-%m-%d").to_string(),
            end_date: b.end_date.format("%Y-%m-%d").to_string(),
            total_days: b.total_days,
            total_amount: b.total_amount,
            status: b.status.as_str().to_string(),
            payment_status: b.payment_status.as_str().to_string(),
            payment_verified: b.payment_verified,
            payment_deadline: b
                .payment_deadline
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
            order_id: b.order_id.clone(),
            payment_id: b.payment_id.clone(),
            payment_attempts: b.payment_attempts,
            payment_error: b.payment_error.clone(),
            pickup_location: b.pickup_location.clone(),
            dropoff_location: b.dropoff_location.clone(),
            owner_phone: b.owner_phone.clone(),
            owner_upi_id: b.owner_upi_id.clone(),
            expired: b.is_expired(now),
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub car_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub pickup_location: String,
    pub dropoff_location: String,
}

#[derive(Serialize)]
pub struct CreateBookingResponse {
    pub booking: BookingResponse,
    pub owner: OwnerResponse,
}

#[derive(Serialize)]
pub struct OwnerResponse {
    pub name: String,
    pub phone: String,
    pub upi_id: String,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    let user = auth::require_user(&state, &headers)?;

    let input = CreateBookingInput {
        car_id: body.car_id,
        start_date: body.start_date,
        end_date: body.end_date,
        pickup_location: body.pickup_location,
        dropoff_location: body.dropoff_location,
    };

    let created = {
        let db = state.db.lock().unwrap();
        booking::create_booking(
            &db,
            &state.owner,
            state.config.payment_grace_minutes,
            &user.id,
            &input,
        )?
    };

    let now = Utc::now().naive_utc();
    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking: BookingResponse::from_booking(&created, now),
            owner: OwnerResponse {
                name: state.owner.name.clone(),
                phone: state.owner.phone.clone(),
                upi_id: state.owner.upi_id.clone(),
            },
        }),
    ))
}

// GET /api/bookings/my
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let user = auth::require_user(&state, &headers)?;

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::get_bookings_for_user(&db, &user.id)?
    };

    let now = Utc::now().naive_utc();
    Ok(Json(
        bookings
            .iter()
            .map(|b| BookingResponse::from_booking(b, now))
            .collect(),
    ))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let user = auth::require_user(&state, &headers)?;

    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    if booking.user_id != user.id && !user.role.is_admin() {
        return Err(AppError::Forbidden(
            "not authorized to access this booking".to_string(),
        ));
    }

    Ok(Json(BookingResponse::from_booking(
        &booking,
        Utc::now().naive_utc(),
    )))
}

// PUT /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let user = auth::require_user(&state, &headers)?;
    let now = Utc::now().naive_utc();

    let cancelled = {
        let db = state.db.lock().unwrap();
        booking::cancel_booking(&db, &user, &id, now)?
    };

    Ok(Json(BookingResponse::from_booking(&cancelled, now)))
}

// POST /api/bookings/:id/verify-payment — renter polling of the manual flow
#[derive(Serialize)]
pub struct VerifyPollResponse {
    pub verified: bool,
    pub expired: bool,
    pub message: String,
    pub booking: BookingResponse,
}

pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<VerifyPollResponse>, AppError> {
    let user = auth::require_user(&state, &headers)?;
    let now = Utc::now().naive_utc();

    let outcome = {
        let db = state.db.lock().unwrap();
        booking::verify_payment_poll(&db, &user, &id, now)?
    };

    let message = if outcome.expired {
        "payment deadline has passed, please create a new booking".to_string()
    } else if outcome.verified {
        "payment verified, your booking is confirmed".to_string()
    } else {
        "payment verification pending, waiting for the owner to confirm".to_string()
    };

    Ok(Json(VerifyPollResponse {
        verified: outcome.verified,
        expired: outcome.expired,
        message,
        booking: BookingResponse::from_booking(&outcome.booking, now),
    }))
}

// PUT /api/bookings/:id/confirm-payment — owner/admin "money received"
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let user = auth::require_user(&state, &headers)?;

    let (confirmed, newly_paid) = {
        let db = state.db.lock().unwrap();
        booking::confirm_payment_manual(&db, &user, &id)?
    };

    if newly_paid {
        tokio::spawn(notify::send_booking_confirmation(
            state.clone(),
            confirmed.id.clone(),
        ));
    }

    Ok(Json(BookingResponse::from_booking(
        &confirmed,
        Utc::now().naive_utc(),
    )))
}
