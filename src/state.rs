use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::{ClaimedIdentityResolver, IdentityResolver},
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
};

pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityResolver>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self::with_identity(pool, config, Arc::new(ClaimedIdentityResolver))
    }

    pub fn with_identity(
        pool: PgPool,
        config: AppConfig,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            identity,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
