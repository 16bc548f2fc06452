// src/handlers/auth.rs

use axum::{
    Form, Json,
    extract::{FromRequest, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, UserSummary},
    services::auth::{authenticate, landing_page},
    utils::session::{Claims, clear_session_cookie, current_session, session_cookie, sign_session},
};

/// Login credentials sent either as JSON or as an url-encoded form.
pub struct LoginPayload(pub LoginRequest);

impl<S> FromRequest<S> for LoginPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        let payload = if is_json {
            Json::<LoginRequest>::from_request(req, state).await?.0
        } else {
            Form::<LoginRequest>::from_request(req, state).await?.0
        };
        Ok(LoginPayload(payload))
    }
}

/// Authenticates a user and opens a session.
///
/// The session token is set as an HttpOnly cookie and also returned in the
/// body for clients that prefer the Authorization header.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    LoginPayload(payload): LoginPayload,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(&pool, &payload.email, &payload.password).await?;

    let claims = Claims::for_user(&user, config.jwt_expiration)?;
    let token = sign_session(&claims, &config.jwt_secret)?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&token, config.jwt_expiration))],
        Json(json!({
            "success": true,
            "message": "Inicio de sesión exitoso",
            "user": UserSummary::from(&user),
            "token": token,
            "redirect": landing_page(&user.role),
        })),
    ))
}

/// Clears the session cookie.
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(json!({
            "success": true,
            "message": "Sesión cerrada exitosamente",
            "redirect": "/auth",
        })),
    )
}

/// Reports whether the caller holds a valid session. Never fails.
pub async fn check_session(
    State(config): State<Config>,
    headers: HeaderMap,
) -> impl IntoResponse {
    match current_session(&headers, &config) {
        Some(claims) => Json(json!({
            "authenticated": true,
            "user": {
                "id": claims.user_id(),
                "email": claims.email,
                "name": claims.name,
                "role": claims.role,
            }
        })),
        None => Json(json!({ "authenticated": false })),
    }
}
