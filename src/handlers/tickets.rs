// src/handlers/tickets.rs

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{response::ResolveForm, ticket::StatusUpdateRequest},
    repository::tickets,
    services::{uploads::{FileStore, Uploader}, workflow},
    utils::{
        extract::{ApiJson, ApiPath},
        multipart::FormData,
        session::{Claims, require_self_or_admin},
    },
};

/// Form field carrying the proof image on resolve.
pub const PROOF_IMAGE_FIELD: &str = "resolution_image";

/// Lists every ticket, newest first.
/// Admin only.
pub async fn list_tickets(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let tickets = tickets::list_tickets(&pool, None).await?;
    Ok(Json(json!({ "success": true, "tickets": tickets })))
}

/// Lists tickets of one category; `todos` lists all.
/// Admin only.
pub async fn list_tickets_by_category(
    State(pool): State<PgPool>,
    ApiPath(category): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let tickets = tickets::list_tickets(&pool, Some(category.as_str())).await?;
    Ok(Json(json!({ "success": true, "tickets": tickets })))
}

/// Aggregate counts for the admin dashboard.
/// Admin only.
pub async fn get_stats(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let stats = tickets::get_stats(&pool).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// Tickets owned by a user. The caller must be that user or an admin.
pub async fn list_user_tickets(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    require_self_or_admin(&claims, user_id)?;

    let tickets = tickets::list_tickets_for_user(&pool, user_id).await?;
    Ok(Json(json!({ "success": true, "tickets": tickets })))
}

/// A single ticket with response and files.
/// Students only see their own tickets; others read as not found.
pub async fn get_ticket(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = tickets::get_ticket(&pool, id)
        .await?
        .filter(|detail| claims.is_admin() || detail.ticket.user_id == claims.user_id())
        .ok_or(AppError::NotFound("Queja no encontrada".to_string()))?;

    Ok(Json(json!({ "success": true, "ticket": ticket })))
}

/// Sets a ticket's status.
/// Admin only.
pub async fn update_status(
    State(pool): State<PgPool>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<StatusUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status = workflow::change_status(&pool, id, &payload.status).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Estado actualizado",
        "complaint_id": id,
        "status": status,
    })))
}

/// Resolves a ticket from a multipart form with an optional proof image.
/// Admin only.
pub async fn resolve_ticket(
    State(pool): State<PgPool>,
    State(files): State<FileStore>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<i64>,
    form: FormData,
) -> Result<impl IntoResponse, AppError> {
    let resolve = ResolveForm {
        assigned_to: form.text("assigned_to"),
        admin_response: form.text("admin_response"),
        status: form.text("status"),
        resolution_date: form.text("resolution_date"),
        time_spent: form.text("time_spent"),
        follow_up_required: form.text("follow_up_required"),
        follow_up_date: form.text("follow_up_date"),
        internal_notes: form.text("internal_notes"),
    };
    let proof = form.files_named(PROOF_IMAGE_FIELD).into_iter().next();

    let resolver = Uploader {
        email: &claims.email,
        user_id: claims.user_id(),
    };
    let resolved = workflow::resolve_ticket(&pool, &files, resolver, id, &resolve, proof.as_ref()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Queja resuelta",
        "complaint_id": resolved.complaint_id,
        "status": resolved.status,
        "response": resolved.response,
        "proof_image": resolved.proof_image,
    })))
}
