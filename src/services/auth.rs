// src/services/auth.rs

use sqlx::PgPool;

use crate::{
    config::Config,
    error::AppError,
    models::user::{ROLE_ADMIN, User},
    repository::users::{self, NewUser},
    utils::hash::{hash_password, verify_password},
};

/// Normalized form of a login email.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Resolves credentials to an active user and records the login.
///
/// Unknown emails, inactive users and wrong passwords share one 401 message.
pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("Email y contraseña son requeridos".to_string()));
    }

    let user = users::find_active_by_email(pool, &email)
        .await?
        .filter(|user| verify_password(password, &user.password))
        .ok_or_else(|| AppError::AuthError("Credenciales incorrectas".to_string()))?;

    users::touch(pool, user.id).await?;
    tracing::info!("User {} logged in as {}", user.id, user.role);

    Ok(user)
}

/// Where the frontend goes after login.
pub fn landing_page(role: &str) -> &'static str {
    if role == ROLE_ADMIN { "/admin-dashboard" } else { "/student-dashboard" }
}

/// Provisions the configured admin account when it does not exist yet.
pub async fn ensure_admin(pool: &PgPool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = normalize_email(email);

    if users::email_exists(pool, &email).await? {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", email);
    let admin = NewUser {
        email,
        password: hash_password(password)?,
        user_code: "ADMIN-0001".to_string(),
        role: ROLE_ADMIN.to_string(),
        name: "Administrador".to_string(),
        last_name: "Sistema".to_string(),
        study_area: "Administración".to_string(),
        study_speciality: None,
        term: 0,
    };
    users::insert_user(pool, &admin).await?;
    tracing::info!("Admin user created successfully.");

    Ok(())
}
