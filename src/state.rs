use crate::{config::Config, services::uploads::FileStore};
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub files: FileStore,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let files = FileStore::new(config.upload_dir.clone());
        Self { pool, config, files }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for FileStore {
    fn from_ref(state: &AppState) -> Self {
        state.files.clone()
    }
}
