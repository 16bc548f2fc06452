// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STUDENT: &str = "student";

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login email, stored lowercase.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// Institutional code (matricula / employee number), unique.
    pub user_code: String,

    /// User role: 'student' or 'admin'.
    pub role: String,

    pub name: String,
    pub last_name: String,
    pub study_area: String,
    pub study_speciality: Option<String>,
    pub term: i16,
    pub avatar_initials: Option<String>,
    pub personal_description: Option<String>,
    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    /// Stored initials, or the first letters of name and last name.
    pub fn initials(&self) -> String {
        display_initials(self.avatar_initials.as_deref(), &self.name, &self.last_name)
    }
}

/// Uppercased first letter of each name.
pub fn initials_from(name: &str, last_name: &str) -> String {
    name.trim()
        .chars()
        .take(1)
        .chain(last_name.trim().chars().take(1))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Picks the stored initials when present, otherwise derives them.
pub fn display_initials(stored: Option<&str>, name: &str, last_name: &str) -> String {
    match stored.map(str::trim) {
        Some(initials) if !initials.is_empty() => initials.to_string(),
        _ => initials_from(name, last_name),
    }
}

/// Summary returned by login.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub name: String,
    pub last_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            name: user.name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Profile view of the current user.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub email: String,
    pub user_code: String,
    pub role: String,
    pub name: String,
    pub last_name: String,
    pub study_area: String,
    pub study_speciality: Option<String>,
    pub term: i16,
    pub initials: String,
    pub personal_description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        let initials = user.initials();
        Self {
            id: user.id,
            email: user.email,
            user_code: user.user_code,
            role: user.role,
            name: user.name,
            last_name: user.last_name,
            study_area: user.study_area,
            study_speciality: user.study_speciality,
            term: user.term,
            initials,
            personal_description: user.personal_description,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// DTO for user login. Accepted as JSON or url-encoded form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// DTO for editing the caller's own profile. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "El nombre debe tener entre 1 y 100 caracteres"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "El apellido debe tener entre 1 y 100 caracteres"))]
    pub last_name: Option<String>,
    #[validate(length(max = 100, message = "La especialidad no puede exceder 100 caracteres"))]
    pub study_speciality: Option<String>,
    #[validate(length(max = 500, message = "La descripción personal no puede exceder 500 caracteres"))]
    pub personal_description: Option<String>,
}
