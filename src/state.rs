use std::sync::Arc;

use crate::config::{AppConfig, StorageBackend};
use crate::database::{DatabaseError, DatabaseManager, MemoryStore, PgStore, Store};
use crate::services::{
    AuditService, ConfigurationService, EducationService, MenuService, RoleService, UserService,
};

/// Shared handler state; cheap to clone per request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub menu: MenuService,
    pub configurations: ConfigurationService,
    pub audit: AuditService,
    pub roles: RoleService,
    pub education: EducationService,
    pub users: UserService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let audit = AuditService::new(store.clone(), config.security.enable_audit_logging);
        Self {
            menu: MenuService::new(store.clone(), audit.clone()),
            configurations: ConfigurationService::new(
                store.clone(),
                audit.clone(),
                config.storage.public_url.clone(),
            ),
            roles: RoleService::new(store.clone(), audit.clone()),
            education: EducationService::new(store.clone(), audit.clone()),
            users: UserService::new(store.clone(), audit.clone()),
            audit,
            store,
            config: Arc::new(config),
        }
    }

    /// In-process state with empty tables
    pub fn memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// Open the configured backend, running migrations when asked to
    pub async fn connect(config: AppConfig) -> Result<Self, DatabaseError> {
        let store: Arc<dyn Store> = match config.database.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Postgres => {
                let db = DatabaseManager::connect(&config.database).await?;
                if config.database.run_migrations {
                    db.migrate().await?;
                }
                Arc::new(PgStore::new(db))
            }
        };
        tracing::info!(backend = store.backend_name(), "Storage ready");
        Ok(Self::new(config, store))
    }
}
