use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{self, jwt, otp, password};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::services::notify;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub is_owner: bool,
}

impl UserResponse {
    pub fn from_user(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            phone: u.phone.clone(),
            role: u.role.as_str().to_string(),
            is_owner: u.is_owner,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

// POST /api/auth/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    if body.name.trim().is_empty() || body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "name, email and password are required".to_string(),
        ));
    }

    let email = body.email.trim().to_lowercase();
    let user = {
        let db = state.db.lock().unwrap();
        if queries::get_user_by_email(&db, &email)?.is_some() {
            return Err(AppError::Conflict("user already exists".to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: body.name.trim().to_string(),
            email,
            password_hash: password::hash_password(&body.password)?,
            phone: body.phone.trim().to_string(),
            role: Role::User,
            is_owner: false,
            otp_code: None,
            otp_expires_at: None,
            created_at: Utc::now().naive_utc(),
        };
        queries::create_user(&db, &user)?;
        user
    };

    let token = jwt::create_token(&user.id, user.role.as_str(), &state.config)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse::from_user(&user),
        }),
    ))
}

// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }

    let user = {
        let db = state.db.lock().unwrap();
        queries::get_user_by_email(&db, &body.email.trim().to_lowercase())?
    }
    .ok_or(AppError::Unauthorized)?;

    if !password::verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = jwt::create_token(&user.id, user.role.as_str(), &state.config)?;
    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from_user(&user),
    }))
}

// POST /api/auth/request-otp
#[derive(Deserialize)]
pub struct RequestOtpRequest {
    pub email: String,
}

pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RequestOtpRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.email.trim().is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }

    let email = body.email.trim().to_lowercase();
    let (user_email, code) = {
        let db = state.db.lock().unwrap();
        let user = queries::get_user_by_email(&db, &email)?
            .ok_or_else(|| AppError::NotFound("no account found with this email".to_string()))?;

        let code = otp::generate_code();
        queries::set_user_otp(&db, &user.id, &code, &otp::expiry())?;
        (user.email, code)
    };

    notify::send_otp_email(&state, &user_email, &code)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "message": "one-time code sent",
        "expires_in_minutes": otp::OTP_TTL_MINUTES,
    })))
}

// POST /api/auth/verify-otp
#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if body.email.trim().is_empty() || body.code.trim().is_empty() {
        return Err(AppError::Validation("email and code are required".to_string()));
    }

    let user = {
        let db = state.db.lock().unwrap();
        let user = queries::get_user_by_email(&db, &body.email.trim().to_lowercase())?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

        otp::verify_code(
            user.otp_code.as_deref(),
            user.otp_expires_at,
            body.code.trim(),
            Utc::now().naive_utc(),
        )
        .map_err(|msg| AppError::Validation(msg.to_string()))?;

        // Single use: clear immediately on success.
        queries::clear_user_otp(&db, &user.id)?;
        user
    };

    let token = jwt::create_token(&user.id, user.role.as_str(), &state.config)?;
    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from_user(&user),
    }))
}

// PUT /api/auth/profile
#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let mut user = auth::require_user(&state, &headers)?;

    let db = state.db.lock().unwrap();
    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
        user.name = name.trim().to_string();
    }
    if let Some(email) = body.email {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::Validation("email cannot be empty".to_string()));
        }
        if email != user.email {
            if queries::get_user_by_email(&db, &email)?.is_some() {
                return Err(AppError::Conflict("email is already in use".to_string()));
            }
            user.email = email;
        }
    }
    if let Some(phone) = body.phone {
        user.phone = phone.trim().to_string();
    }

    queries::update_user(&db, &user)?;
    Ok(Json(UserResponse::from_user(&user)))
}

// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, AppError> {
    let user = auth::require_user(&state, &headers)?;
    Ok(Json(UserResponse::from_user(&user)))
}
