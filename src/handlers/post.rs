// src/handlers/post.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::{MAX_ATTACHMENT_BYTES, MAX_ATTACHMENTS_PER_COMPLAINT},
    error::AppError,
    models::ticket::{Category, ComplaintType, NewTicketForm, Priority},
    services::{
        uploads::{FileStore, UploadContext, Uploader},
        workflow::{self, MIN_DESCRIPTION_CHARS, MIN_SUBJECT_CHARS},
    },
    utils::{multipart::FormData, session::Claims},
};

/// Form field carrying complaint attachments (repeatable).
pub const ATTACHMENTS_FIELD: &str = "attachments";

/// Page model for the create-ticket form.
pub async fn new_ticket_form(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    let categories: Vec<_> = Category::ALL
        .iter()
        .map(|c| json!({ "value": c.as_str(), "name": c.display_name() }))
        .collect();

    Json(json!({
        "user": {
            "id": claims.user_id(),
            "name": claims.name,
            "last_name": claims.last_name,
            "study_area": claims.study_area,
            "term": claims.term,
        },
        "types": ComplaintType::ALL.map(ComplaintType::as_str),
        "categories": categories,
        "priorities": Priority::ALL.map(Priority::as_str),
        "min_subject_chars": MIN_SUBJECT_CHARS,
        "min_description_chars": MIN_DESCRIPTION_CHARS,
        "max_files": MAX_ATTACHMENTS_PER_COMPLAINT,
        "max_file_bytes": MAX_ATTACHMENT_BYTES,
        "allowed_extensions": UploadContext::Complaint.allowed_extensions(),
    }))
}

/// Creates a ticket from the student form. Any `status` sent is ignored.
pub async fn submit_ticket(
    State(pool): State<PgPool>,
    State(files): State<FileStore>,
    Extension(claims): Extension<Claims>,
    form: FormData,
) -> Result<impl IntoResponse, AppError> {

    let complaint_type = match form.text("complaint_type") {
        t if t.trim().is_empty() => form.text("type"),
        t => t,
    };
    let ticket_form = NewTicketForm {
        complaint_type,
        category: form.text("category"),
        priority: form.text("priority"),
        subject: form.text("subject"),
        description: form.text("description"),
        incident_date: form.text("incident_date"),
    };
    let attachments = form.files_named(ATTACHMENTS_FIELD);

    let owner = Uploader {
        email: &claims.email,
        user_id: claims.user_id(),
    };
    let created = workflow::create_ticket(&pool, &files, owner, &ticket_form, &attachments).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Queja registrada exitosamente",
            "complaint_id": created.complaint_id,
            "status": created.status,
            "attachments": created.attachments,
        })),
    ))
}
