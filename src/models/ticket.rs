// src/models/ticket.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{attachment::Attachment, response::ResponseView, user::display_initials};

/// Filter value meaning "every category".
pub const ALL_CATEGORIES: &str = "todos";

/// Kind of ticket a student can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintType {
    Queja,
    Sugerencia,
    Peticion,
}

impl ComplaintType {
    pub const ALL: [ComplaintType; 3] = [Self::Queja, Self::Sugerencia, Self::Peticion];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queja => "queja",
            Self::Sugerencia => "sugerencia",
            Self::Peticion => "peticion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

/// Fixed set of complaint categories, with their display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Infraestructura,
    Biblioteca,
    Cafeteria,
    Laboratorios,
    ServiciosEscolares,
    Docentes,
    Seguridad,
    Otros,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Self::Infraestructura,
        Self::Biblioteca,
        Self::Cafeteria,
        Self::Laboratorios,
        Self::ServiciosEscolares,
        Self::Docentes,
        Self::Seguridad,
        Self::Otros,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Infraestructura => "infraestructura",
            Self::Biblioteca => "biblioteca",
            Self::Cafeteria => "cafeteria",
            Self::Laboratorios => "laboratorios",
            Self::ServiciosEscolares => "servicios-escolares",
            Self::Docentes => "docentes",
            Self::Seguridad => "seguridad",
            Self::Otros => "otros",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Infraestructura => "Infraestructura",
            Self::Biblioteca => "Biblioteca",
            Self::Cafeteria => "Cafetería",
            Self::Laboratorios => "Laboratorios",
            Self::ServiciosEscolares => "Servicios Escolares",
            Self::Docentes => "Docentes",
            Self::Seguridad => "Seguridad",
            Self::Otros => "Otros",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Friendly name for a stored category value.
/// Values outside the known set (legacy rows) are title-cased.
pub fn category_display_name(raw: &str) -> String {
    match Category::parse(raw) {
        Some(category) => category.display_name().to_string(),
        None => title_case(raw),
    }
}

fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Alta,
    Media,
    Baja,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::Alta, Self::Media, Self::Baja];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alta => "alta",
            Self::Media => "media",
            Self::Baja => "baja",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

/// Ticket status. Any status may move to any other; `Pendiente` is the
/// only status a ticket is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    Pendiente,
    EnProceso,
    Resuelto,
    Escalado,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        Self::Pendiente,
        Self::EnProceso,
        Self::Resuelto,
        Self::Escalado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::EnProceso => "en-proceso",
            Self::Resuelto => "resuelto",
            Self::Escalado => "escalado",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

/// Raw fields of the create-ticket form, before validation.
#[derive(Debug, Default, Clone)]
pub struct NewTicketForm {
    pub complaint_type: String,
    pub category: String,
    pub priority: String,
    pub subject: String,
    pub description: String,
    pub incident_date: String,
}

/// A create-ticket submission that passed validation.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub complaint_type: ComplaintType,
    pub category: Category,
    pub priority: Option<Priority>,
    pub subject: String,
    pub description: String,
    pub incident_date: Option<NaiveDate>,
}

/// A complaint joined with its owner, as read by the listing queries.
#[derive(Debug, Clone, FromRow)]
pub struct TicketRow {
    pub id: i64,
    pub user_id: i64,
    pub complaint_type: String,
    pub category: String,
    pub priority: Option<String>,
    pub subject: String,
    pub description: String,
    pub incident_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_name: String,
    pub user_last_name: String,
    pub user_email: String,
    pub user_code: String,
    pub avatar_initials: Option<String>,
    /// First image attached by the student.
    pub image_path: Option<String>,
    /// First proof image attached on resolution.
    pub resolution_image_path: Option<String>,
}

/// Ticket as returned by the API, with derived display fields.
#[derive(Debug, Clone, Serialize)]
pub struct TicketSummary {
    pub id: i64,
    pub user_id: i64,
    pub complaint_type: String,
    pub category: String,
    pub category_name: String,
    pub priority: Option<String>,
    pub subject: String,
    pub description: String,
    pub incident_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_name: String,
    pub user_last_name: String,
    pub user_email: String,
    pub user_code: String,
    pub user_initials: String,
    pub image_path: Option<String>,
    pub resolution_image_path: Option<String>,
}

impl From<TicketRow> for TicketSummary {
    fn from(row: TicketRow) -> Self {
        let category_name = category_display_name(&row.category);
        let user_initials =
            display_initials(row.avatar_initials.as_deref(), &row.user_name, &row.user_last_name);
        Self {
            id: row.id,
            user_id: row.user_id,
            complaint_type: row.complaint_type,
            category: row.category,
            category_name,
            priority: row.priority,
            subject: row.subject,
            description: row.description,
            incident_date: row.incident_date,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user_name: row.user_name,
            user_last_name: row.user_last_name,
            user_email: row.user_email,
            user_code: row.user_code,
            user_initials,
            image_path: row.image_path,
            resolution_image_path: row.resolution_image_path,
        }
    }
}

/// Single ticket with its response and every stored file.
#[derive(Debug, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: TicketSummary,
    pub response: Option<ResponseView>,
    pub attachments: Vec<Attachment>,
    pub resolution_images: Vec<Attachment>,
}

/// Body of `PUT /api/tickets/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct CountBucket {
    pub key: String,
    pub count: i64,
}

/// Aggregates over tickets owned by active users.
#[derive(Debug, Serialize)]
pub struct TicketStats {
    pub total: i64,
    pub by_status: Vec<CountBucket>,
    pub by_category: Vec<CountBucket>,
    pub by_priority: Vec<CountBucket>,
}
