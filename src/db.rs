use crate::config::{Config, StoreBackend};
use crate::store::memory::MemoryStore;
use crate::store::mysql::MySqlStore;
use crate::store::{RecordStore, StoreError};
use sqlx::MySqlPool;
use std::sync::Arc;

/// Connects and brings the schema up to date. Migrations are tracked by
/// sqlx, so running this on every start is safe.
pub async fn init_db(database_url: &str) -> Result<MySqlPool, StoreError> {
    let pool = MySqlPool::connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>, StoreError> {
    match &config.store {
        StoreBackend::MySql { database_url } => {
            let pool = init_db(database_url).await?;
            tracing::info!("connected to MySQL record store");
            Ok(Arc::new(MySqlStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory record store; data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
