// src/models/response.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::ticket::TicketStatus;

/// Upper bound for `time_spent`, NUMERIC(4,2).
pub const MAX_TIME_SPENT: f64 = 99.99;

/// Represents the 'complaint_responses' table (one row per complaint).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ComplaintResponse {
    pub id: i64,
    pub complaint_id: i64,
    pub assigned_to: String,
    pub admin_response: String,
    pub resolution_date: NaiveDate,
    pub time_spent: Option<f64>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub internal_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response fields exposed with a ticket.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseView {
    pub assigned_to: String,
    pub admin_response: String,
    pub resolution_date: NaiveDate,
    pub time_spent: Option<f64>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub internal_notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ComplaintResponse> for ResponseView {
    fn from(r: ComplaintResponse) -> Self {
        Self {
            assigned_to: r.assigned_to,
            admin_response: r.admin_response,
            resolution_date: r.resolution_date,
            time_spent: r.time_spent,
            follow_up_required: r.follow_up_required,
            follow_up_date: r.follow_up_date,
            internal_notes: r.internal_notes,
            updated_at: r.updated_at,
        }
    }
}

/// Raw fields of the resolve form, before validation.
#[derive(Debug, Default, Clone)]
pub struct ResolveForm {
    pub assigned_to: String,
    pub admin_response: String,
    pub status: String,
    pub resolution_date: String,
    pub time_spent: String,
    pub follow_up_required: String,
    pub follow_up_date: String,
    pub internal_notes: String,
}

/// A resolve submission that passed validation.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub assigned_to: String,
    pub admin_response: String,
    pub status: TicketStatus,
    pub resolution_date: NaiveDate,
    pub time_spent: Option<f64>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub internal_notes: Option<String>,
}
