// src/config.rs

use std::env;
use std::path::PathBuf;
use dotenvy::dotenv;

/// Largest accepted complaint attachment.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;
/// Largest accepted resolution proof image.
pub const MAX_PROOF_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_ATTACHMENTS_PER_COMPLAINT: usize = 5;
/// Request body cap: every attachment at its limit plus form fields.
pub const MAX_REQUEST_BYTES: usize = MAX_ATTACHMENTS_PER_COMPLAINT * MAX_ATTACHMENT_BYTES + 1024 * 1024;

/// Stored images are scaled down to fit inside this box.
pub const MAX_IMAGE_WIDTH: u32 = 1920;
pub const MAX_IMAGE_HEIGHT: u32 = 1080;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Session lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub upload_dir: PathBuf,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            upload_dir,
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.trim().is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
            port,
        }
    }
}
