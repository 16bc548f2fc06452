// src/handlers/profile.rs

use axum::{
    Extension, Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{ProfileResponse, UpdateProfileRequest, initials_from},
    repository::users::{self, ProfileChanges},
    utils::{
        extract::ApiJson,
        html::clean_text,
        session::{Claims, session_cookie, sign_session},
    },
};

/// Get the current user's profile.
pub async fn get_profile(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::find_active_by_id(&pool, claims.user_id())
        .await?
        .ok_or(AppError::NotFound("Usuario no encontrado".to_string()))?;

    Ok(Json(json!({ "success": true, "profile": ProfileResponse::from(user) })))
}

/// Update the current user's profile.
/// Recomputes stored initials on a name change and reissues the session so
/// its copy of the profile stays current.
pub async fn update_profile(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = users::find_active_by_id(&pool, claims.user_id())
        .await?
        .ok_or(AppError::NotFound("Usuario no encontrado".to_string()))?;

    let name = payload.name.as_deref().map(str::trim).map(str::to_string);
    let last_name = payload.last_name.as_deref().map(str::trim).map(str::to_string);
    if name.as_deref() == Some("") || last_name.as_deref() == Some("") {
        return Err(AppError::invalid("El nombre y el apellido no pueden estar vacíos"));
    }

    let avatar_initials = (name.is_some() || last_name.is_some()).then(|| {
        initials_from(
            name.as_deref().unwrap_or(&current.name),
            last_name.as_deref().unwrap_or(&current.last_name),
        )
    });

    let changes = ProfileChanges {
        name,
        last_name,
        study_speciality: payload.study_speciality.as_deref().map(|s| s.trim().to_string()),
        personal_description: payload.personal_description.as_deref().map(clean_text),
        avatar_initials,
    };

    let user = users::update_profile(&pool, current.id, &changes)
        .await?
        .ok_or(AppError::NotFound("Usuario no encontrado".to_string()))?;
    tracing::info!("User {} updated their profile", user.id);

    let token = sign_session(&Claims::for_user(&user, config.jwt_expiration)?, &config.jwt_secret)?;

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, config.jwt_expiration))],
        Json(json!({
            "success": true,
            "message": "Perfil actualizado",
            "profile": ProfileResponse::from(user),
        })),
    ))
}
