//! Tenant Registry: durable `page_id -> destination_url` mappings.
//!
//! Routes are upserted by `page_id` and soft-deleted via `is_active`; rows are
//! never removed so dead-letter records keep something to correlate against.

use crate::errors::{RegistryError, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use url::Url;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TenantRoute {
    pub page_id: String,
    pub tenant_name: String,
    pub destination_url: String,
    /// Reserved for per-tenant signing; inbound verification uses the app secret.
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated registration, ready to be upserted.
#[derive(Clone, Debug, PartialEq)]
pub struct NewTenantRoute {
    pub page_id: String,
    pub tenant_name: String,
    /// Stored as given; only checked to parse as an http(s) URL.
    pub destination_url: String,
    pub secret_key: Option<String>,
}

/// Registration request as received on the wire. Fields are optional so that
/// missing values produce a validation error instead of a parse error.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegisterRoute {
    #[serde(default, alias = "pageId", deserialize_with = "string_or_number")]
    pub page_id: Option<String>,
    #[serde(alias = "tenantName")]
    pub tenant_name: Option<String>,
    #[serde(alias = "destinationUrl")]
    pub destination_url: Option<String>,
    #[serde(alias = "secretKey")]
    pub secret_key: Option<String>,
}

/// Page ids may arrive as JSON numbers; they are kept as their decimal text.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PageId {
        Text(String),
        Number(serde_json::Number),
    }

    let page_id = Option::<PageId>::deserialize(deserializer)?;
    Ok(page_id.map(|id| match id {
        PageId::Text(text) => text,
        PageId::Number(number) => number.to_string(),
    }))
}

impl RegisterRoute {
    pub fn validate(self) -> Result<NewTenantRoute, RegistryError> {
        let present =
            |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let (Some(page_id), Some(tenant_name), Some(destination_url)) = (
            present(self.page_id),
            present(self.tenant_name),
            present(self.destination_url),
        ) else {
            return Err(RegistryError::Validation(
                "Missing required fields: page_id, tenant_name, destination_url".into(),
            ));
        };

        let is_http = Url::parse(&destination_url)
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https"));
        if !is_http {
            return Err(RegistryError::Validation(
                "Invalid destination_url format".into(),
            ));
        }

        Ok(NewTenantRoute {
            page_id,
            tenant_name,
            destination_url,
            secret_key: present(self.secret_key),
        })
    }
}

#[async_trait]
pub trait RouteStore: Send + Sync {
    /// All routes, active or not, newest first.
    async fn list_routes(&self) -> Result<Vec<TenantRoute>, StorageError>;

    /// Inserts the route or overwrites every mutable field of the existing row
    /// for the same `page_id`, leaving it active.
    async fn upsert_route(&self, route: &NewTenantRoute) -> Result<TenantRoute, StorageError>;

    /// Marks the route inactive. Returns whether a row matched.
    async fn deactivate_route(&self, page_id: &str) -> Result<bool, StorageError>;

    async fn find_active_destination(&self, page_id: &str) -> Result<Option<String>, StorageError>;
}

#[derive(Clone)]
pub struct TenantRegistry {
    store: Arc<dyn RouteStore>,
}

impl TenantRegistry {
    pub fn new(store: Arc<dyn RouteStore>) -> Self {
        Self { store }
    }

    pub async fn list_routes(&self) -> Result<Vec<TenantRoute>, RegistryError> {
        self.store.list_routes().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to list tenant routes");
            RegistryError::from(e)
        })
    }

    pub async fn register_route(
        &self,
        request: RegisterRoute,
    ) -> Result<TenantRoute, RegistryError> {
        let route = request.validate()?;

        let stored = self.store.upsert_route(&route).await.map_err(|e| {
            tracing::error!(
                page_id = %route.page_id,
                error = %e,
                "Failed to register tenant route"
            );
            RegistryError::from(e)
        })?;

        tracing::info!(
            page_id = %stored.page_id,
            tenant = %stored.tenant_name,
            destination = %stored.destination_url,
            "Tenant route registered"
        );
        Ok(stored)
    }

    /// Deactivating an unknown page is a successful no-op. The page id is
    /// trimmed the same way registration trims it.
    pub async fn deactivate_route(&self, page_id: &str) -> Result<(), RegistryError> {
        let page_id = page_id.trim();
        let matched = self.store.deactivate_route(page_id).await.map_err(|e| {
            tracing::error!(page_id, error = %e, "Failed to deactivate tenant route");
            RegistryError::from(e)
        })?;

        if matched {
            tracing::info!(page_id, "Tenant route deactivated");
        } else {
            tracing::info!(page_id, "Deactivation requested for unknown page");
        }
        Ok(())
    }
}
