// src/services/workflow.rs
//
// Ticket lifecycle: creation with attachments, status changes and
// resolution. Files are written before the database rows that reference
// them, so every failing path after a write removes what it wrote.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;

use crate::{
    config::MAX_ATTACHMENTS_PER_COMPLAINT,
    error::AppError,
    models::{
        response::{MAX_TIME_SPENT, Resolution, ResolveForm, ResponseView},
        ticket::{Category, ComplaintType, NewTicket, NewTicketForm, Priority, TicketStatus},
    },
    repository::tickets,
    services::uploads::{FileStore, IncomingFile, StoredFile, UploadContext, Uploader, check_upload},
    utils::html::{clean_optional, clean_text},
};

pub const MIN_SUBJECT_CHARS: usize = 5;
pub const MAX_SUBJECT_CHARS: usize = 200;
pub const MIN_DESCRIPTION_CHARS: usize = 20;
pub const MAX_ASSIGNED_TO_CHARS: usize = 100;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Serialize)]
pub struct CreatedTicket {
    pub complaint_id: i64,
    pub status: TicketStatus,
    pub attachments: Vec<StoredFile>,
}

#[derive(Debug, Serialize)]
pub struct ResolvedTicket {
    pub complaint_id: i64,
    pub status: TicketStatus,
    pub response: ResponseView,
    pub proof_image: Option<StoredFile>,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

fn allowed_values<T: Copy>(values: &[T], as_str: fn(T) -> &'static str) -> String {
    values.iter().map(|v| as_str(*v)).collect::<Vec<_>>().join(", ")
}

/// Checks a create-ticket form. Every violation is reported, not just the first.
pub fn validate_new_ticket(form: &NewTicketForm) -> Result<NewTicket, AppError> {
    let mut errors = Vec::new();

    let complaint_type = ComplaintType::parse(form.complaint_type.trim());
    if complaint_type.is_none() {
        errors.push(format!(
            "Tipo inválido. Valores permitidos: {}",
            allowed_values(&ComplaintType::ALL, ComplaintType::as_str)
        ));
    }

    let category = Category::parse(form.category.trim());
    if category.is_none() {
        errors.push(format!(
            "Categoría inválida. Valores permitidos: {}",
            allowed_values(&Category::ALL, Category::as_str)
        ));
    }

    let priority = match form.priority.trim() {
        "" => None,
        raw => {
            let parsed = Priority::parse(raw);
            if parsed.is_none() {
                errors.push(format!(
                    "Prioridad inválida. Valores permitidos: {}",
                    allowed_values(&Priority::ALL, Priority::as_str)
                ));
            }
            parsed
        }
    };

    // Lengths are checked on the sanitized text, which is what gets stored
    let subject = clean_text(&form.subject);
    let subject_len = subject.chars().count();
    if subject_len < MIN_SUBJECT_CHARS {
        errors.push(format!("El asunto debe tener al menos {} caracteres", MIN_SUBJECT_CHARS));
    } else if subject_len > MAX_SUBJECT_CHARS {
        errors.push(format!("El asunto no puede exceder {} caracteres", MAX_SUBJECT_CHARS));
    }

    let description = clean_text(&form.description);
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        errors.push(format!(
            "La descripción debe tener al menos {} caracteres",
            MIN_DESCRIPTION_CHARS
        ));
    }

    let incident_date = match form.incident_date.trim() {
        "" => None,
        raw => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push("Fecha del incidente inválida (formato AAAA-MM-DD)".to_string());
            }
            parsed
        }
    };

    match (complaint_type, category) {
        (Some(complaint_type), Some(category)) if errors.is_empty() => Ok(NewTicket {
            complaint_type,
            category,
            priority,
            subject,
            description,
            incident_date,
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

/// Checks a resolve form. Missing required fields are named together.
pub fn validate_resolution(form: &ResolveForm) -> Result<Resolution, AppError> {
    let mut errors = Vec::new();

    let assigned_to = form.assigned_to.trim();
    let admin_response = clean_text(&form.admin_response);

    let missing: Vec<&str> = [
        ("assigned_to", assigned_to),
        ("admin_response", admin_response.as_str()),
        ("status", form.status.trim()),
        ("resolution_date", form.resolution_date.trim()),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(name, _)| name)
    .collect();
    if !missing.is_empty() {
        errors.push(format!("Campos requeridos faltantes: {}", missing.join(", ")));
    }
    if assigned_to.chars().count() > MAX_ASSIGNED_TO_CHARS {
        errors.push(format!(
            "El responsable asignado no puede exceder {} caracteres",
            MAX_ASSIGNED_TO_CHARS
        ));
    }

    let status = match form.status.trim() {
        "" => None,
        raw => {
            let parsed = TicketStatus::parse(raw);
            if parsed.is_none() {
                errors.push(format!(
                    "Estado inválido. Valores permitidos: {}",
                    allowed_values(&TicketStatus::ALL, TicketStatus::as_str)
                ));
            }
            parsed
        }
    };

    let resolution_date = match form.resolution_date.trim() {
        "" => None,
        raw => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push("Fecha de resolución inválida (formato AAAA-MM-DD)".to_string());
            }
            parsed
        }
    };

    let time_spent = match form.time_spent.trim() {
        "" => None,
        raw => match raw.parse::<f64>() {
            Ok(hours) if hours.is_finite() && (0.0..=MAX_TIME_SPENT).contains(&hours) => Some(hours),
            _ => {
                errors.push(format!(
                    "El tiempo invertido debe ser un número entre 0 y {}",
                    MAX_TIME_SPENT
                ));
                None
            }
        },
    };

    let follow_up_required = matches!(
        form.follow_up_required.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "si" | "sí"
    );

    let follow_up_date = match form.follow_up_date.trim() {
        "" => None,
        raw => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push("Fecha de seguimiento inválida (formato AAAA-MM-DD)".to_string());
            }
            parsed
        }
    };

    match (status, resolution_date) {
        (Some(status), Some(resolution_date)) if errors.is_empty() => Ok(Resolution {
            assigned_to: assigned_to.to_string(),
            admin_response,
            status,
            resolution_date,
            time_spent,
            follow_up_required,
            follow_up_date,
            internal_notes: clean_optional(&form.internal_notes),
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

/// Checks the attachment set of a new ticket without writing anything.
fn check_attachments(attachments: &[IncomingFile]) -> Vec<String> {
    let mut errors = Vec::new();
    if attachments.len() > MAX_ATTACHMENTS_PER_COMPLAINT {
        errors.push(format!(
            "Máximo {} archivos por queja",
            MAX_ATTACHMENTS_PER_COMPLAINT
        ));
    }
    for file in attachments {
        if let Err(AppError::Validation(reasons)) = check_upload(file, UploadContext::Complaint) {
            errors.extend(reasons);
        }
    }
    errors
}

/// Creates a ticket in 'pendiente' with its attachments.
///
/// Nothing is written unless the form and every attachment pass. Files
/// already stored are removed if a later file or the database step fails.
pub async fn create_ticket(
    pool: &PgPool,
    files: &FileStore,
    owner: Uploader<'_>,
    form: &NewTicketForm,
    attachments: &[IncomingFile],
) -> Result<CreatedTicket, AppError> {
    let ticket = validate_new_ticket(form);
    let attachment_errors = check_attachments(attachments);
    let ticket = match ticket {
        Ok(ticket) if attachment_errors.is_empty() => ticket,
        Ok(_) => return Err(AppError::Validation(attachment_errors)),
        Err(AppError::Validation(mut errors)) => {
            errors.extend(attachment_errors);
            return Err(AppError::Validation(errors));
        }
        Err(other) => return Err(other),
    };

    let mut stored = Vec::with_capacity(attachments.len());
    for (seq, file) in attachments.iter().enumerate() {
        match files.store(file, UploadContext::Complaint, owner, seq as i64 + 1).await {
            Ok(saved) => stored.push(saved),
            Err(e) => {
                files.cleanup(&stored).await;
                return Err(e);
            }
        }
    }

    match insert_ticket(pool, owner.user_id, &ticket, &stored).await {
        Ok(complaint_id) => {
            tracing::info!(
                "Complaint {} created by user {} with {} attachment(s)",
                complaint_id,
                owner.user_id,
                stored.len()
            );
            Ok(CreatedTicket {
                complaint_id,
                status: TicketStatus::Pendiente,
                attachments: stored,
            })
        }
        Err(e) => {
            files.cleanup(&stored).await;
            Err(e)
        }
    }
}

async fn insert_ticket(
    pool: &PgPool,
    user_id: i64,
    ticket: &NewTicket,
    stored: &[StoredFile],
) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;
    let complaint_id = tickets::insert_complaint(&mut *tx, user_id, ticket).await?;
    for file in stored {
        tickets::insert_attachment(&mut *tx, UploadContext::Complaint.kind(), complaint_id, file).await?;
    }
    tx.commit().await?;
    Ok(complaint_id)
}

/// Moves a ticket to any of the four statuses.
pub async fn change_status(pool: &PgPool, id: i64, raw_status: &str) -> Result<TicketStatus, AppError> {
    let status = TicketStatus::parse(raw_status.trim()).ok_or_else(|| {
        AppError::invalid(format!(
            "Estado inválido. Valores permitidos: {}",
            allowed_values(&TicketStatus::ALL, TicketStatus::as_str)
        ))
    })?;

    if !tickets::set_status(pool, id, status).await? {
        return Err(AppError::NotFound("Queja no encontrada".to_string()));
    }
    tracing::info!("Complaint {} moved to {}", id, status.as_str());
    Ok(status)
}

/// Resolves a ticket: sets its status, creates or overwrites its single
/// response and records the optional proof image, all in one transaction.
pub async fn resolve_ticket(
    pool: &PgPool,
    files: &FileStore,
    resolver: Uploader<'_>,
    id: i64,
    form: &ResolveForm,
    proof: Option<&IncomingFile>,
) -> Result<ResolvedTicket, AppError> {
    let resolution = validate_resolution(form)?;

    if tickets::ticket_owner(pool, id).await?.is_none() {
        return Err(AppError::NotFound("Queja no encontrada".to_string()));
    }

    let proof_image = match proof {
        Some(file) => Some(files.store(file, UploadContext::Resolution, resolver, id).await?),
        None => None,
    };

    match persist_resolution(pool, id, &resolution, proof_image.as_ref()).await {
        Ok(response) => {
            tracing::info!("Complaint {} resolved by user {}", id, resolver.user_id);
            Ok(ResolvedTicket {
                complaint_id: id,
                status: resolution.status,
                response,
                proof_image,
            })
        }
        Err(e) => {
            if let Some(file) = &proof_image {
                files.cleanup(std::slice::from_ref(file)).await;
            }
            Err(e)
        }
    }
}

async fn persist_resolution(
    pool: &PgPool,
    id: i64,
    resolution: &Resolution,
    proof_image: Option<&StoredFile>,
) -> Result<ResponseView, AppError> {
    let mut tx = pool.begin().await?;

    if !tickets::set_status(&mut *tx, id, resolution.status).await? {
        return Err(AppError::NotFound("Queja no encontrada".to_string()));
    }
    let response = tickets::upsert_response(&mut *tx, id, resolution).await?;
    if let Some(file) = proof_image {
        tickets::insert_attachment(&mut *tx, UploadContext::Resolution.kind(), id, file).await?;
    }

    tx.commit().await?;
    Ok(ResponseView::from(response))
}
