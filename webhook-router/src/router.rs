use crate::config::Paths;
use hyper::{Method, Request};
use std::sync::Arc;

/// Operations served on the public listener
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    WebhookVerify,
    WebhookEvent,
    ListTenants,
    RegisterTenant,
    DeactivateTenant,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::WebhookVerify => "webhook_verify",
            Endpoint::WebhookEvent => "webhook_event",
            Endpoint::ListTenants => "list_tenants",
            Endpoint::RegisterTenant => "register_tenant",
            Endpoint::DeactivateTenant => "deactivate_tenant",
        }
    }
}

/// Matches incoming requests against the configured paths
#[derive(Clone)]
pub struct Router {
    paths: Arc<Paths>,
}

impl Router {
    pub fn new(paths: Paths) -> Self {
        Self {
            paths: Arc::new(paths),
        }
    }

    /// Finds the endpoint for a request by exact path and method.
    pub fn find_endpoint<B>(&self, req: &Request<B>) -> Option<Endpoint> {
        let path = req.uri().path();
        let method = req.method();

        let endpoint = if path == self.paths.webhook {
            match *method {
                Method::GET => Some(Endpoint::WebhookVerify),
                Method::POST => Some(Endpoint::WebhookEvent),
                _ => None,
            }
        } else if path == self.paths.register {
            match *method {
                Method::GET => Some(Endpoint::ListTenants),
                Method::POST => Some(Endpoint::RegisterTenant),
                Method::DELETE => Some(Endpoint::DeactivateTenant),
                _ => None,
            }
        } else {
            None
        };

        if endpoint.is_none() {
            tracing::warn!(method = %method, path = %path, "No route matched");
        }
        endpoint
    }
}
