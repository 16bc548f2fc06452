// src/models/attachment.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A stored file linked to a complaint. Same shape for student
/// attachments and admin resolution proofs.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub complaint_id: i64,
    pub original_filename: String,
    pub stored_filename: String,
    /// Path relative to the upload root.
    pub file_path: String,
    pub file_size: i64,
    /// Lowercase extension without the dot.
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}

/// Which table a stored file is recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Complaint,
    Resolution,
}

impl AttachmentKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Complaint => "complaint_attachments",
            Self::Resolution => "resolution_images",
        }
    }
}
