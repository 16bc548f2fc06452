// src/repository/users.rs

use sqlx::PgPool;

use crate::{error::AppError, models::user::User};

const USER_COLUMNS: &str = r#"
    id, email, password, user_code, role, name, last_name, study_area,
    study_speciality, term, avatar_initials, personal_description, is_active,
    created_at, updated_at
"#;

/// Fields for provisioning a user. `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub user_code: String,
    pub role: String,
    pub name: String,
    pub last_name: String,
    pub study_area: String,
    pub study_speciality: Option<String>,
    pub term: i16,
}

/// Profile columns to overwrite; `None` keeps the stored value.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub study_speciality: Option<String>,
    pub personal_description: Option<String>,
    pub avatar_initials: Option<String>,
}

pub async fn find_active_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active = TRUE");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_active_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = TRUE");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Records a successful login.
pub async fn touch(pool: &PgPool, id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_user(pool: &PgPool, user: &NewUser) -> Result<i64, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO users
            (email, password, user_code, role, name, last_name, study_area, study_speciality, term, avatar_initials)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(&user.email)
    .bind(&user.password)
    .bind(&user.user_code)
    .bind(&user.role)
    .bind(&user.name)
    .bind(&user.last_name)
    .bind(&user.study_area)
    .bind(&user.study_speciality)
    .bind(user.term)
    .bind(crate::models::user::initials_from(&user.name, &user.last_name))
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Applies profile edits to an active user and returns the updated row.
pub async fn update_profile(
    pool: &PgPool,
    id: i64,
    changes: &ProfileChanges,
) -> Result<Option<User>, AppError> {
    let sql = format!(
        r#"
        UPDATE users SET
            name = COALESCE($2, name),
            last_name = COALESCE($3, last_name),
            study_speciality = COALESCE($4, study_speciality),
            personal_description = COALESCE($5, personal_description),
            avatar_initials = COALESCE($6, avatar_initials),
            updated_at = NOW()
        WHERE id = $1 AND is_active = TRUE
        RETURNING {USER_COLUMNS}
        "#
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.last_name)
        .bind(&changes.study_speciality)
        .bind(&changes.personal_description)
        .bind(&changes.avatar_initials)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}
