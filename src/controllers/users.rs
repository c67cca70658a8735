use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::{ApiResult, AppError},
    extractors::ValidatedJson,
    middleware::AuthUser,
    models::user::{Credentials, RegisterUser, User},
    services::auth::{self, IssuedToken},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(obtain_token))
        .route("/me", get(me))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(form): ValidatedJson<RegisterUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let hash = auth::hash_password(&form.password)?;
    let user = User::create(&state.db.pool, &form, &hash).await?;
    tracing::info!("User {} registered (id={})", user.email, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchanges email and password for a signed access token.
pub async fn obtain_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(credentials): ValidatedJson<Credentials>,
) -> ApiResult<Json<IssuedToken>> {
    let user = User::find_by_email(&state.db.pool, &credentials.email)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized)?;

    if !auth::verify_password(&credentials.password, &user.password_hash) {
        tracing::warn!("Failed login attempt for {}", user.email);
        return Err(AppError::Unauthorized);
    }

    Ok(Json(auth::issue_token(&state.config.jwt, &user)?))
}

pub async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Json<User>> {
    User::find_by_id(&state.db.pool, user.user_id)
        .await?
        .map(Json)
        .ok_or(AppError::not_found("User", user.user_id))
}
