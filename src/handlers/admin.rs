use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::UserResponse;
use crate::handlers::bookings::BookingResponse;
use crate::models::{BookingStatus, Role};
use crate::state::AppState;

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    auth::require_admin(&state, &headers)?;

    let limit = query.limit.unwrap_or(50);
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::get_all_bookings(&db, query.status.as_deref(), limit)?
    };

    let now = Utc::now().naive_utc();
    Ok(Json(
        bookings
            .iter()
            .map(|b| BookingResponse::from_booking(b, now))
            .collect(),
    ))
}

// PATCH /api/admin/bookings/:id
#[derive(Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateBookingStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    auth::require_admin(&state, &headers)?;

    let status = BookingStatus::parse(&body.status);
    if status.as_str() != body.status {
        return Err(AppError::Validation(format!(
            "invalid booking status: {}",
            body.status
        )));
    }

    let db = state.db.lock().unwrap();
    if !queries::update_booking_status(&db, &id, &status)? {
        return Err(AppError::NotFound("booking not found".to_string()));
    }
    let updated = queries::get_booking(&db, &id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    Ok(Json(BookingResponse::from_booking(
        &updated,
        Utc::now().naive_utc(),
    )))
}

// DELETE /api/admin/bookings/:id — destructive, unrecoverable
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth::require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    if !queries::delete_booking(&db, &id)? {
        return Err(AppError::NotFound("booking not found".to_string()));
    }
    tracing::info!(booking_id = %id, "booking deleted by admin");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/admin/users
pub async fn get_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    auth::require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    let users = queries::list_users(&db)?;
    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

// GET /api/admin/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    auth::require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    let user = queries::get_user_by_id(&db, &id)?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
    Ok(Json(UserResponse::from_user(&user)))
}

// PATCH /api/admin/users/:id
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub is_owner: Option<bool>,
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    auth::require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    let mut user = queries::get_user_by_id(&db, &id)?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    if let Some(name) = body.name {
        user.name = name;
    }
    if let Some(email) = body.email {
        let email = email.trim().to_lowercase();
        if email != user.email && queries::get_user_by_email(&db, &email)?.is_some() {
            return Err(AppError::Conflict("email is already in use".to_string()));
        }
        user.email = email;
    }
    if let Some(phone) = body.phone {
        user.phone = phone;
    }
    if let Some(role) = body.role {
        let parsed = Role::parse(&role);
        if parsed.as_str() != role {
            return Err(AppError::Validation(format!("invalid role: {role}")));
        }
        user.role = parsed;
    }
    if let Some(is_owner) = body.is_owner {
        user.is_owner = is_owner;
    }

    queries::update_user(&db, &user)?;
    Ok(Json(UserResponse::from_user(&user)))
}

// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth::require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    if !queries::delete_user(&db, &id)? {
        return Err(AppError::NotFound("user not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
