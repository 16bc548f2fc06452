// src/repository/tickets.rs

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        attachment::{Attachment, AttachmentKind},
        response::{ComplaintResponse, Resolution, ResponseView},
        ticket::{
            ALL_CATEGORIES, CountBucket, NewTicket, TicketDetail, TicketRow, TicketStats,
            TicketStatus, TicketSummary,
        },
    },
    services::uploads::StoredFile,
};

/// Select list shared by every ticket read. Expects `c` (complaints) and
/// `u` (users) in scope.
const TICKET_COLUMNS: &str = r#"
    c.id, c.user_id, c.complaint_type, c.category, c.priority, c.subject,
    c.description, c.incident_date, c.status, c.created_at, c.updated_at,
    u.name AS user_name, u.last_name AS user_last_name, u.email AS user_email,
    u.user_code, u.avatar_initials,
    (SELECT a.file_path FROM complaint_attachments a
      WHERE a.complaint_id = c.id AND a.file_type IN ('jpg', 'jpeg', 'png', 'gif')
      ORDER BY a.id LIMIT 1) AS image_path,
    (SELECT r.file_path FROM resolution_images r
      WHERE r.complaint_id = c.id AND r.file_type IN ('jpg', 'jpeg', 'png', 'gif')
      ORDER BY r.id LIMIT 1) AS resolution_image_path
"#;

const ACTIVE_TICKETS: &str = "FROM complaints c JOIN users u ON u.id = c.user_id WHERE u.is_active = TRUE";

const ATTACHMENT_COLUMNS: &str =
    "id, complaint_id, original_filename, stored_filename, file_path, file_size, file_type, created_at";

/// Ticket row LEFT JOINed with its response; response columns are null
/// until the ticket is resolved once.
#[derive(Debug, FromRow)]
struct TicketDetailRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    response_id: Option<i64>,
    assigned_to: Option<String>,
    admin_response: Option<String>,
    resolution_date: Option<NaiveDate>,
    time_spent: Option<f64>,
    follow_up_required: Option<bool>,
    follow_up_date: Option<NaiveDate>,
    internal_notes: Option<String>,
    response_updated_at: Option<DateTime<Utc>>,
}

impl TicketDetailRow {
    fn response(&self) -> Option<ResponseView> {
        self.response_id?;
        Some(ResponseView {
            assigned_to: self.assigned_to.clone().unwrap_or_default(),
            admin_response: self.admin_response.clone().unwrap_or_default(),
            resolution_date: self.resolution_date?,
            time_spent: self.time_spent,
            follow_up_required: self.follow_up_required.unwrap_or(false),
            follow_up_date: self.follow_up_date,
            internal_notes: self.internal_notes.clone(),
            updated_at: self.response_updated_at?,
        })
    }
}

/// All tickets of active users, newest first.
/// `category` filters by exact match; `None` or `"todos"` means no filter.
pub async fn list_tickets(pool: &PgPool, category: Option<&str>) -> Result<Vec<TicketSummary>, AppError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {TICKET_COLUMNS} {ACTIVE_TICKETS}"));

    if let Some(category) = category.filter(|c| *c != ALL_CATEGORIES) {
        builder.push(" AND c.category = ");
        builder.push_bind(category);
    }
    builder.push(" ORDER BY c.created_at DESC, c.id DESC");

    let rows = builder.build_query_as::<TicketRow>().fetch_all(pool).await?;
    Ok(rows.into_iter().map(TicketSummary::from).collect())
}

/// Tickets owned by one user, newest first.
pub async fn list_tickets_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<TicketSummary>, AppError> {
    let sql = format!(
        "SELECT {TICKET_COLUMNS} {ACTIVE_TICKETS} AND c.user_id = $1 ORDER BY c.created_at DESC, c.id DESC"
    );
    let rows = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(TicketSummary::from).collect())
}

/// One ticket with its response and every stored file.
pub async fn get_ticket(pool: &PgPool, id: i64) -> Result<Option<TicketDetail>, AppError> {
    let sql = format!(
        r#"
        SELECT {TICKET_COLUMNS},
            cr.id AS response_id, cr.assigned_to, cr.admin_response, cr.resolution_date,
            cr.time_spent::FLOAT8 AS time_spent, cr.follow_up_required, cr.follow_up_date,
            cr.internal_notes, cr.updated_at AS response_updated_at
        FROM complaints c
        JOIN users u ON u.id = c.user_id
        LEFT JOIN complaint_responses cr ON cr.complaint_id = c.id
        WHERE u.is_active = TRUE AND c.id = $1
        "#
    );
    let Some(row) = sqlx::query_as::<_, TicketDetailRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let attachments = list_attachments(pool, AttachmentKind::Complaint, id).await?;
    let resolution_images = list_attachments(pool, AttachmentKind::Resolution, id).await?;
    let response = row.response();

    Ok(Some(TicketDetail {
        ticket: TicketSummary::from(row.ticket),
        response,
        attachments,
        resolution_images,
    }))
}

/// Owner of a ticket, if the ticket exists and its owner is active.
pub async fn ticket_owner(pool: &PgPool, id: i64) -> Result<Option<i64>, AppError> {
    let owner = sqlx::query_scalar::<_, i64>(&format!("SELECT c.user_id {ACTIVE_TICKETS} AND c.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(owner)
}

pub async fn list_attachments(
    pool: &PgPool,
    kind: AttachmentKind,
    complaint_id: i64,
) -> Result<Vec<Attachment>, AppError> {
    let sql = format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM {} WHERE complaint_id = $1 ORDER BY id",
        kind.table()
    );
    let files = sqlx::query_as::<_, Attachment>(&sql)
        .bind(complaint_id)
        .fetch_all(pool)
        .await?;
    Ok(files)
}

async fn count_by<'e, E: PgExecutor<'e>>(executor: E, column: &str) -> Result<Vec<CountBucket>, AppError> {
    let sql = format!(
        "SELECT COALESCE(c.{column}, 'sin-asignar') AS key, COUNT(*) AS count {ACTIVE_TICKETS} GROUP BY 1 ORDER BY 2 DESC, 1"
    );
    let buckets = sqlx::query_as::<_, CountBucket>(&sql).fetch_all(executor).await?;
    Ok(buckets)
}

/// Counts by status, category and priority plus the total.
/// All four read one snapshot so they agree with each other.
pub async fn get_stats(pool: &PgPool) -> Result<TicketStats, AppError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {ACTIVE_TICKETS}"))
        .fetch_one(&mut *tx)
        .await?;
    let by_status = count_by(&mut *tx, "status").await?;
    let by_category = count_by(&mut *tx, "category").await?;
    let by_priority = count_by(&mut *tx, "priority").await?;

    tx.commit().await?;

    Ok(TicketStats {
        total,
        by_status,
        by_category,
        by_priority,
    })
}

/// Sets a ticket's status. Returns false when no ticket of an active user matched.
pub async fn set_status<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    status: TicketStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE complaints SET status = $1, updated_at = NOW()
        WHERE id = $2
          AND user_id IN (SELECT id FROM users WHERE is_active = TRUE)
        "#,
    )
    .bind(status.as_str())
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Inserts a complaint. Status is always the initial 'pendiente'.
pub async fn insert_complaint<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
    ticket: &NewTicket,
) -> Result<i64, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO complaints
            (user_id, complaint_type, category, priority, subject, description, incident_date, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(ticket.complaint_type.as_str())
    .bind(ticket.category.as_str())
    .bind(ticket.priority.map(|p| p.as_str()))
    .bind(&ticket.subject)
    .bind(&ticket.description)
    .bind(ticket.incident_date)
    .bind(TicketStatus::Pendiente.as_str())
    .fetch_one(executor)
    .await?;

    Ok(id)
}

pub async fn insert_attachment<'e, E: PgExecutor<'e>>(
    executor: E,
    kind: AttachmentKind,
    complaint_id: i64,
    file: &StoredFile,
) -> Result<i64, AppError> {
    let sql = format!(
        r#"
        INSERT INTO {}
            (complaint_id, original_filename, stored_filename, file_path, file_size, file_type)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
        kind.table()
    );
    let id = sqlx::query_scalar::<_, i64>(&sql)
        .bind(complaint_id)
        .bind(&file.original_filename)
        .bind(&file.stored_filename)
        .bind(&file.relative_path)
        .bind(file.size)
        .bind(&file.file_type)
        .fetch_one(executor)
        .await?;
    Ok(id)
}

/// Creates the ticket's response or overwrites it in place.
/// The UNIQUE constraint on complaint_id makes this atomic.
pub async fn upsert_response<'e, E: PgExecutor<'e>>(
    executor: E,
    complaint_id: i64,
    resolution: &Resolution,
) -> Result<ComplaintResponse, AppError> {
    let response = sqlx::query_as::<_, ComplaintResponse>(
        r#"
        INSERT INTO complaint_responses
            (complaint_id, assigned_to, admin_response, resolution_date, time_spent,
             follow_up_required, follow_up_date, internal_notes)
        VALUES ($1, $2, $3, $4, $5::FLOAT8, $6, $7, $8)
        ON CONFLICT (complaint_id) DO UPDATE SET
            assigned_to = EXCLUDED.assigned_to,
            admin_response = EXCLUDED.admin_response,
            resolution_date = EXCLUDED.resolution_date,
            time_spent = EXCLUDED.time_spent,
            follow_up_required = EXCLUDED.follow_up_required,
            follow_up_date = EXCLUDED.follow_up_date,
            internal_notes = EXCLUDED.internal_notes,
            updated_at = NOW()
        RETURNING id, complaint_id, assigned_to, admin_response, resolution_date,
            time_spent::FLOAT8 AS time_spent, follow_up_required, follow_up_date,
            internal_notes, created_at, updated_at
        "#,
    )
    .bind(complaint_id)
    .bind(&resolution.assigned_to)
    .bind(&resolution.admin_response)
    .bind(resolution.resolution_date)
    .bind(resolution.time_spent)
    .bind(resolution.follow_up_required)
    .bind(resolution.follow_up_date)
    .bind(&resolution.internal_notes)
    .fetch_one(executor)
    .await?;

    Ok(response)
}
