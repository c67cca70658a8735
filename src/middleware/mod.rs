use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::{error::AppError, models::User, services::auth, AppState};

pub mod permissions;

pub use permissions::StaffUser;

/// Caller identity, resolved from `Authorization: Bearer <jwt>` or
/// `Authorization: Basic base64(email:password)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub is_staff: bool,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            let claims = auth::verify_token(&state.config.jwt, token.trim())
                .map_err(|_| AppError::Unauthorized)?;
            return Ok(AuthUser {
                user_id: claims.sub,
                email: claims.email,
                is_staff: claims.is_staff,
            });
        }

        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(AppError::Unauthorized)?;
        let (email, password) = decode_basic(encoded).ok_or(AppError::Unauthorized)?;

        // Проверяем в БД
        let user = User::find_by_email(&state.db.pool, &email)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::Unauthorized)?;

        if !auth::verify_password(&password, &user.password_hash) {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            is_staff: user.is_staff,
        })
    }
}

/// `base64(email:password)` -> `(email, password)`.
fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (email, password) = credentials.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}
