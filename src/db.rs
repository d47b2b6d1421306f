use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement,
};
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

/// Establishes a connection pool to the database.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    info!("database connection established");
    Ok(pool)
}

/// Establishes a connection pool using the application configuration.
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: cfg.database_url.clone(),
        max_connections: cfg.db_max_connections,
        min_connections: cfg.db_min_connections,
        connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
        idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
        acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
    };

    establish_connection_with_config(&config).await
}

/// Creates the orders table if it does not exist. Used by development
/// and test environments; production schemas are managed externally.
pub async fn ensure_schema(db: &DbPool) -> Result<(), ServiceError> {
    let ddl = match db.get_database_backend() {
        DbBackend::Sqlite => {
            r#"CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY NOT NULL,
                order_number TEXT NOT NULL UNIQUE,
                customer_id TEXT NOT NULL,
                status TEXT NOT NULL,
                currency TEXT NOT NULL,
                total_minor BIGINT NOT NULL,
                line_items TEXT NOT NULL,
                shipping_address TEXT,
                provider_order_id TEXT,
                provider_payment_id TEXT,
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                version INTEGER NOT NULL DEFAULT 1
            );"#
        }
        _ => {
            r#"CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                order_number TEXT NOT NULL UNIQUE,
                customer_id UUID NOT NULL,
                status TEXT NOT NULL,
                currency TEXT NOT NULL,
                total_minor BIGINT NOT NULL,
                line_items JSON NOT NULL,
                shipping_address JSON,
                provider_order_id TEXT,
                provider_payment_id TEXT,
                notes TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ,
                version INTEGER NOT NULL DEFAULT 1
            );"#
        }
    };

    db.execute(Statement::from_string(
        db.get_database_backend(),
        ddl.to_string(),
    ))
    .await?;

    info!("orders schema ensured");
    Ok(())
}
