//! Registration API: HTTP surface over [`TenantRegistry`].

use crate::api::utils::{error_response, parse_query};
use crate::errors::RegistryError;
use crate::registry::{RegisterRoute, TenantRegistry, TenantRoute};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use shared::http::{ResponseBody, make_json_response};

#[derive(Serialize)]
struct TenantList {
    tenants: Vec<TenantRoute>,
}

#[derive(Serialize)]
struct Registered {
    success: bool,
    message: String,
    tenant: TenantRoute,
}

#[derive(Serialize)]
struct Deactivated {
    success: bool,
    message: String,
}

#[derive(Clone)]
pub struct RegistrationApi {
    registry: TenantRegistry,
}

impl RegistrationApi {
    pub fn new(registry: TenantRegistry) -> Self {
        Self { registry }
    }

    pub async fn list(&self) -> Response<ResponseBody> {
        match self.registry.list_routes().await {
            Ok(tenants) => make_json_response(StatusCode::OK, &TenantList { tenants }),
            Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list tenants"),
        }
    }

    pub async fn register(&self, body: Bytes) -> Response<ResponseBody> {
        let request: RegisterRoute = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected registration with unparseable body");
                return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
            }
        };

        match self.registry.register_route(request).await {
            Ok(tenant) => make_json_response(
                StatusCode::CREATED,
                &Registered {
                    success: true,
                    message: format!("Tenant \"{}\" registered successfully", tenant.tenant_name),
                    tenant,
                },
            ),
            Err(RegistryError::Validation(message)) => {
                error_response(StatusCode::BAD_REQUEST, &message)
            }
            Err(RegistryError::Storage(_)) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to register tenant",
            ),
        }
    }

    /// Accepts the page id as `page_id` or `pageId`.
    pub async fn deactivate(&self, query: Option<&str>) -> Response<ResponseBody> {
        let params = parse_query(query);
        let Some(page_id) = params
            .get("page_id")
            .or_else(|| params.get("pageId"))
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
        else {
            return error_response(StatusCode::BAD_REQUEST, "Missing page_id query parameter");
        };

        match self.registry.deactivate_route(page_id).await {
            Ok(()) => make_json_response(
                StatusCode::OK,
                &Deactivated {
                    success: true,
                    message: format!("Route for Page ID \"{page_id}\" has been deactivated"),
                },
            ),
            Err(_) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to deactivate tenant",
            ),
        }
    }
}
