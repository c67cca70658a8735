use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::{AdminConfig, JwtConfig},
    database::Database,
    error::AppError,
    models::User,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64, // user id
    pub email: String,
    pub is_staff: bool,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
}

#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub fn issue_token(config: &JwtConfig, user: &User) -> Result<IssuedToken, AppError> {
    let now = Utc::now();
    let ttl = Duration::hours(config.expires_in_hours);
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        is_staff: user.is_staff,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4(),
    };

    let access = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(IssuedToken {
        access,
        token_type: "Bearer",
        expires_in: ttl.num_seconds(),
    })
}

pub fn verify_token(config: &JwtConfig, token: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Creates the configured staff account, or promotes it if it already exists.
pub async fn ensure_admin(db: &Database, admin: &AdminConfig) -> Result<(), AppError> {
    let hash = hash_password(&admin.password)?;
    let user = User::upsert_staff(&db.pool, &admin.email, &hash).await?;
    info!("Staff account {} is ready (id={})", user.email, user.id);
    Ok(())
}
