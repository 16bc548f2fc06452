// src/utils/session.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, SESSION_COOKIE},
    error::AppError,
    models::user::{ROLE_ADMIN, ROLE_STUDENT, User},
};

/// Session contents, signed into the `session` cookie.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    pub email: String,
    pub user_code: String,
    /// 'student' or 'admin'.
    pub role: String,
    pub name: String,
    pub last_name: String,
    pub study_area: String,
    pub study_speciality: Option<String>,
    pub term: i16,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn for_user(user: &User, expiration_seconds: u64) -> Result<Self, AppError> {
        let expiration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .as_secs() as usize
            + expiration_seconds as usize;

        Ok(Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            user_code: user.user_code.clone(),
            role: user.role.clone(),
            name: user.name.clone(),
            last_name: user.last_name.clone(),
            study_area: user.study_area.clone(),
            study_speciality: user.study_speciality.clone(),
            term: user.term,
            exp: expiration,
        })
    }

    pub fn user_id(&self) -> i64 {
        self.sub.parse::<i64>().unwrap_or(0)
    }

    pub fn is_admin(&self) -> bool {
        authorize(self, ROLE_ADMIN)
    }
}

/// Role check by equality; admins are not implicitly students.
pub fn authorize(claims: &Claims, required_role: &str) -> bool {
    claims.role == required_role
}

/// `authorize` as a 403 outcome.
pub fn require_role(claims: &Claims, required_role: &str) -> Result<(), AppError> {
    if authorize(claims, required_role) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Acceso no autorizado".to_string()))
    }
}

/// Caller must be the given user or an admin.
pub fn require_self_or_admin(claims: &Claims, user_id: i64) -> Result<(), AppError> {
    if claims.user_id() == user_id || claims.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Acceso no autorizado".to_string()))
    }
}

pub fn sign_session(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a session token.
pub fn verify_session(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Sesión inválida o expirada".to_string()))?;

    if token_data.claims.sub.parse::<i64>().is_err() {
        return Err(AppError::AuthError("Sesión inválida o expirada".to_string()));
    }

    Ok(token_data.claims)
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age_seconds: u64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_seconds
    )
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Session token from `Authorization: Bearer` or the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

/// Decodes the caller's session, if any.
pub fn current_session(headers: &HeaderMap, config: &Config) -> Option<Claims> {
    token_from_headers(headers).and_then(|token| verify_session(token, &config.jwt_secret).ok())
}

/// Axum Middleware: Authentication.
///
/// Resolves the session from the cookie or bearer header and injects the
/// `Claims` into the request extensions. Returns 401 without a valid session.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = current_session(req.headers(), &config)
        .ok_or_else(|| AppError::AuthError("Debes iniciar sesión".to_string()))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn role_gate(req: &Request<Body>, role: &str) -> Result<(), AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::AuthError("Debes iniciar sesión".to_string()))?;
    require_role(claims, role)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Returns 403 for any other role.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    role_gate(&req, ROLE_ADMIN)?;
    Ok(next.run(req).await)
}

/// Axum Middleware: Student Authorization. Same contract as `admin_middleware`.
pub async fn student_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    role_gate(&req, ROLE_STUDENT)?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn claims(role: &str, id: i64) -> Claims {
        Claims {
            sub: id.to_string(),
            email: "ana@uni.mx".to_string(),
            user_code: "A001".to_string(),
            role: role.to_string(),
            name: "Ana".to_string(),
            last_name: "Ruiz".to_string(),
            study_area: "Ingeniería".to_string(),
            study_speciality: None,
            term: 3,
            exp: 4_000_000_000,
        }
    }

    #[test]
    fn role_checks_are_equality() {
        assert!(authorize(&claims("admin", 1), "admin"));
        assert!(!authorize(&claims("admin", 1), "student"));
        assert!(matches!(
            require_role(&claims("student", 1), "admin"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn self_or_admin() {
        assert!(require_self_or_admin(&claims("student", 5), 5).is_ok());
        assert!(require_self_or_admin(&claims("student", 6), 5).is_err());
        assert!(require_self_or_admin(&claims("admin", 1), 5).is_ok());
    }

    #[test]
    fn token_round_trip_and_wrong_secret() {
        let original = claims("student", 7);
        let token = sign_session(&original, "secret").unwrap();
        assert_eq!(verify_session(&token, "secret").unwrap(), original);
        assert!(matches!(verify_session(&token, "other"), Err(AppError::AuthError(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut old = claims("student", 7);
        old.exp = 1;
        let token = sign_session(&old, "secret").unwrap();
        assert!(verify_session(&token, "secret").is_err());
    }

    #[test]
    fn token_is_read_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=abc.def"));
        assert_eq!(token_from_headers(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers), Some("xyz"));

        let mut cleared = HeaderMap::new();
        cleared.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(token_from_headers(&cleared), None);
    }
}
