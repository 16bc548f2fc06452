// src/error.rs

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500, the database could not be reached
    ConnectionError(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 500, a file could not be written or verified
    StorageError(String),

    // 400, every violated rule of the submitted input
    Validation(Vec<String>),

    // 400 Bad Request (malformed body, unreadable form)
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
}

impl AppError {
    /// Shorthand for a validation failure with a single reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        AppError::Validation(vec![reason.into()])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConnectionError(_)
            | AppError::InternalServerError(_)
            | AppError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Every failure body carries `success: false` and a message; internal details
/// are logged here and never sent to the caller.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::ConnectionError(msg) => {
                tracing::error!("Database connection error: {}", msg);
                json!({
                    "success": false,
                    "message": "Error de conexión a la base de datos",
                })
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({
                    "success": false,
                    "message": "Error interno del servidor",
                })
            }
            AppError::StorageError(msg) => {
                tracing::error!("Storage error: {}", msg);
                json!({
                    "success": false,
                    "message": "Error al guardar el archivo",
                })
            }
            AppError::Validation(errors) => json!({
                "success": false,
                "message": "Datos inválidos",
                "errors": errors,
            }),
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg) => json!({
                "success": false,
                "message": msg,
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into the matching `AppError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => AppError::ConnectionError(err.to_string()),
            sqlx::Error::RowNotFound => AppError::NotFound("Registro no encontrado".to_string()),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        tracing::warn!("Malformed multipart body: {}", err);
        AppError::BadRequest("Formulario inválido".to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!("Rejected JSON body: {}", rejection.body_text());
        AppError::BadRequest("Cuerpo JSON inválido".to_string())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        tracing::warn!("Rejected form body: {}", rejection.body_text());
        AppError::BadRequest("Formulario inválido".to_string())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        tracing::warn!("Rejected multipart body: {}", rejection.body_text());
        AppError::BadRequest("Formulario inválido".to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::warn!("Rejected path parameter: {}", rejection.body_text());
        AppError::BadRequest("Parámetro de ruta inválido".to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut reasons: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        reasons.sort();
        AppError::Validation(reasons)
    }
}
