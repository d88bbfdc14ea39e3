//! SQLite-backed storage for tenant routes and dead-letter records.

use crate::dead_letter::{DeadLetterStore, FailedWebhookEvent};
use crate::errors::StorageError;
use crate::registry::{NewTenantRoute, RouteStore, TenantRoute};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row};
use std::str::FromStr;

const CREATE_TENANT_ROUTES_SQL: &str = "
CREATE TABLE IF NOT EXISTS tenant_routes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id TEXT NOT NULL UNIQUE,
    tenant_name TEXT NOT NULL,
    destination_url TEXT NOT NULL,
    secret_key TEXT,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const CREATE_FAILED_EVENTS_SQL: &str = "
CREATE TABLE IF NOT EXISTS failed_webhook_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id TEXT NOT NULL,
    destination_url TEXT NOT NULL,
    payload TEXT NOT NULL,
    error_message TEXT NOT NULL,
    next_retry_at TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

const CREATE_FAILED_EVENTS_RETRY_INDEX_SQL: &str = "
CREATE INDEX IF NOT EXISTS failed_webhook_events_next_retry_at
    ON failed_webhook_events (next_retry_at)";

const ROUTE_COLUMNS: &str =
    "page_id, tenant_name, destination_url, secret_key, is_active, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::InvalidDatabaseUrl(e.to_string()))?
            .create_if_missing(true);

        // An in-memory database lives only as long as its connection.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options.connect_with(options).await?;
        Ok(Self { pool })
    }

    /// A fresh, migrated, process-private database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let store = Self::connect("sqlite::memory:").await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Creates the tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        for statement in [
            CREATE_TENANT_ROUTES_SQL,
            CREATE_FAILED_EVENTS_SQL,
            CREATE_FAILED_EVENTS_RETRY_INDEX_SQL,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Dead-letter records, oldest first.
    pub async fn list_failed_events(&self) -> Result<Vec<FailedWebhookEvent>, StorageError> {
        let events = sqlx::query_as::<_, FailedWebhookEvent>(
            "SELECT page_id, destination_url, payload, error_message, next_retry_at
             FROM failed_webhook_events ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}

#[async_trait]
impl RouteStore for SqliteStore {
    async fn list_routes(&self) -> Result<Vec<TenantRoute>, StorageError> {
        let routes = sqlx::query_as::<_, TenantRoute>(&format!(
            "SELECT {ROUTE_COLUMNS} FROM tenant_routes ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(routes)
    }

    async fn upsert_route(&self, route: &NewTenantRoute) -> Result<TenantRoute, StorageError> {
        let now = Utc::now();
        let stored = sqlx::query_as::<_, TenantRoute>(&format!(
            "INSERT INTO tenant_routes
                (page_id, tenant_name, destination_url, secret_key, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
             ON CONFLICT (page_id) DO UPDATE SET
                tenant_name = excluded.tenant_name,
                destination_url = excluded.destination_url,
                secret_key = excluded.secret_key,
                is_active = 1,
                updated_at = excluded.updated_at
             RETURNING {ROUTE_COLUMNS}"
        ))
        .bind(&route.page_id)
        .bind(&route.tenant_name)
        .bind(&route.destination_url)
        .bind(&route.secret_key)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn deactivate_route(&self, page_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE tenant_routes SET is_active = 0, updated_at = ?1 WHERE page_id = ?2",
        )
        .bind(Utc::now())
        .bind(page_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_active_destination(&self, page_id: &str) -> Result<Option<String>, StorageError> {
        let destination = sqlx::query_scalar::<_, String>(
            "SELECT destination_url FROM tenant_routes WHERE page_id = ?1 AND is_active = 1",
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(destination)
    }
}

#[async_trait]
impl DeadLetterStore for SqliteStore {
    async fn insert_failed_event(&self, event: &FailedWebhookEvent) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO failed_webhook_events
                (page_id, destination_url, payload, error_message, next_retry_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&event.page_id)
        .bind(&event.destination_url)
        .bind(&event.payload)
        .bind(&event.error_message)
        .bind(event.next_retry_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl<'r> FromRow<'r, SqliteRow> for TenantRoute {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            page_id: row.try_get("page_id")?,
            tenant_name: row.try_get("tenant_name")?,
            destination_url: row.try_get("destination_url")?,
            secret_key: row.try_get("secret_key")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for FailedWebhookEvent {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            page_id: row.try_get("page_id")?,
            destination_url: row.try_get("destination_url")?,
            payload: row.try_get("payload")?,
            error_message: row.try_get("error_message")?,
            next_retry_at: row.try_get("next_retry_at")?,
        })
    }
}
