use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{PgStore, Store};
use crate::storage::{self, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    /// Connects to the database (waiting for it to come up), applies migrations
    /// and builds the configured media storage.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = &config.database;
        let store = PgStore::connect(&db.url, db.max_connections, db.connect_attempts).await?;
        store.migrate().await?;

        let storage = Arc::from(storage::from_config(&config.storage).await?);

        Ok(Self::from_parts(Arc::new(store), Arc::new(config), storage))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            store,
            config,
            storage,
        }
    }
}
