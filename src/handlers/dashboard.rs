// src/handlers/dashboard.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::{error::AppError, models::user::display_initials, repository::tickets, utils::session::Claims};

fn current_user(claims: &Claims) -> serde_json::Value {
    json!({
        "id": claims.user_id(),
        "email": claims.email,
        "name": claims.name,
        "last_name": claims.last_name,
        "role": claims.role,
        "study_area": claims.study_area,
        "term": claims.term,
        "initials": display_initials(None, &claims.name, &claims.last_name),
    })
}

/// Page model for the student dashboard: the caller's own tickets.
/// Student only.
pub async fn student_dashboard(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let tickets = tickets::list_tickets_for_user(&pool, claims.user_id()).await?;
    Ok(Json(json!({ "user": current_user(&claims), "tickets": tickets })))
}

/// Page model for the admin dashboard: stats and every ticket.
/// Admin only.
pub async fn admin_dashboard(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let stats = tickets::get_stats(&pool).await?;
    let tickets = tickets::list_tickets(&pool, None).await?;
    Ok(Json(json!({ "user": current_user(&claims), "stats": stats, "tickets": tickets })))
}
