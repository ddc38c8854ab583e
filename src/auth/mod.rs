pub mod jwt;
pub mod otp;
pub mod password;

use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::state::AppState;

/// Resolve the bearer token to a full user record. Handlers call this first;
/// the token is trusted as the sole authentication input.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
    let claims = jwt::verify_token(token, &state.config).map_err(|_| AppError::Unauthorized)?;

    let db = state.db.lock().unwrap();
    queries::get_user_by_id(&db, &claims.sub)?.ok_or(AppError::Unauthorized)
}

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user = require_user(state, headers)?;
    if !user.role.is_admin() {
        return Err(AppError::Forbidden("admin access required".to_string()));
    }
    Ok(user)
}
