//! HTTP-facing error type.
//!
//! Every handler returns `ApiResult<T>`; `AppError` turns into a JSON body
//! `{"success": false, "message": ..., "errors": {...}}` with the matching
//! status code. Internal failures are logged and their detail hidden.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

pub type ApiResult<T> = Result<T, AppError>;

/// Field name -> list of messages, the way clients render form errors.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication credentials were not provided or are invalid.")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{resource} {id} not found.")]
    NotFound { resource: &'static str, id: i64 },

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid input.")]
    Validation(FieldErrors),

    #[error("database error")]
    Database(#[source] sqlx::Error),

    #[error("token error")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing error")]
    Hashing(#[from] bcrypt::BcryptError),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: FieldErrors,
}

impl AppError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        AppError::Validation(errors)
    }

    pub fn not_found(resource: &'static str, id: i64) -> Self {
        AppError::NotFound { resource, id }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Token(_) | AppError::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // Нарушения ограничений - ошибка клиента, а не сервера
            if db_err.is_unique_violation() {
                return AppError::bad_request(unique_message(db_err.constraint()));
            }
            if db_err.is_foreign_key_violation() {
                return AppError::bad_request("Invalid pk - object does not exist.");
            }
            if db_err.is_check_violation() {
                return AppError::bad_request("Value violates a table constraint.");
            }
        }
        AppError::Database(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let errors = errs
            .field_errors()
            .into_iter()
            .map(|(field, list)| {
                let messages = list
                    .iter()
                    .map(|e| match &e.message {
                        Some(msg) => msg.to_string(),
                        None => format!("Invalid value ({}).", e.code),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        AppError::Validation(errors)
    }
}

fn unique_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("tickets_performance_row_seat_key") => {
            "The fields performance, row, seat must make a unique set.".to_string()
        }
        Some("performances_show_time_hall_key") => {
            "The fields show_time, theatre_hall must make a unique set.".to_string()
        }
        Some("genres_name_key") => "genre with this name already exists.".to_string(),
        Some("theatre_halls_name_key") => {
            "theatre hall with this name already exists.".to_string()
        }
        Some("users_email_key") => "user with this email already exists.".to_string(),
        _ => "Object with these values already exists.".to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let message = if status.is_server_error() {
            "Internal server error.".to_string()
        } else {
            self.to_string()
        };
        let errors = match self {
            AppError::Validation(errors) => errors,
            _ => FieldErrors::new(),
        };

        (status, Json(ErrorBody { success: false, message, errors })).into_response()
    }
}
