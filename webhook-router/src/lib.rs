pub mod api;
pub mod config;
pub mod dead_letter;
pub mod envelope;
pub mod errors;
pub mod forwarder;
pub mod http;
pub mod ingress;
pub mod metrics_defs;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod shutdown;
pub mod signature;
pub mod store;

use crate::api::utils::read_body;
use crate::dead_letter::DeadLetterRecorder;
use crate::errors::WebhookRouterError;
use crate::forwarder::Forwarder;
use crate::ingress::WebhookIngress;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::registration::RegistrationApi;
use crate::registry::TenantRegistry;
use crate::resolver::RouteResolver;
use crate::router::{Endpoint, Router};
use crate::shutdown::ShutdownSignal;
use crate::signature::SignatureVerifier;
use crate::store::SqliteStore;
use hyper::body::{Body, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use shared::admin_service::AdminService;
use shared::http::{ResponseBody, make_boxed_error_response, run_http_service};
use shared::{gauge, histogram};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub use errors::Result;

pub async fn run(config: config::Config) -> Result<()> {
    config.validate()?;
    let secrets = config.secrets.resolve();

    let store = Arc::new(SqliteStore::connect(&config.storage.database_url).await?);
    store.migrate().await?;

    let cache = &config.cache;
    let resolver = RouteResolver::new(store.clone(), cache.ttl(), cache.max_capacity);
    let dead_letters = DeadLetterRecorder::new(store.clone(), config.forwarding.retry_delay());
    let client = reqwest::Client::builder().build()?;
    let forwarder = Forwarder::new(resolver, dead_letters, client, config.forwarding.timeout());

    let verifier = SignatureVerifier::new(secrets.app_secret.as_deref());
    let signatures_enforced = verifier.is_enforced();
    let ingress = WebhookIngress::new(&secrets.verify_token, verifier, forwarder.clone());
    let registration = RegistrationApi::new(TenantRegistry::new(store.clone()));
    let router_service = WebhookRouterService::new(
        Router::new(config.paths.clone()),
        ingress,
        registration,
        config.max_body_bytes,
    );

    let ready = Arc::new(AtomicBool::new(false));
    let shutdown = CancellationToken::new();
    let admin_shutdown = CancellationToken::new();

    let admin_ready = ready.clone();
    let admin_service =
        AdminService::<_, WebhookRouterError>::new(move || admin_ready.load(Ordering::Relaxed));
    let admin_listener = config.admin_listener.clone();
    let admin_stop = admin_shutdown.clone().cancelled_owned();
    let admin_failed = shutdown.clone();
    let admin_task = tokio::spawn(async move {
        let result = run_http_service(
            &admin_listener.host,
            admin_listener.port,
            admin_service,
            admin_stop,
        )
        .await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Admin listener failed");
            admin_failed.cancel();
        }
        result
    });

    let signal = ShutdownSignal::install()?;
    let signal_ready = ready.clone();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal.recv().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        signal_ready.store(false, Ordering::Relaxed);
        signal_shutdown.cancel();
    });

    ready.store(true, Ordering::Relaxed);
    tracing::info!(
        webhook_path = %config.paths.webhook,
        register_path = %config.paths.register,
        signatures_enforced,
        "Webhook router ready"
    );

    let served = run_http_service(
        &config.listener.host,
        config.listener.port,
        router_service,
        shutdown.clone().cancelled_owned(),
    )
    .await;

    // Open connections are closed by now, so nothing new can be submitted.
    // Keep the admin listener up until background forwards drain
    ready.store(false, Ordering::Relaxed);
    if forwarder.shutdown(config.forwarding.shutdown_grace()).await {
        tracing::info!("All in-flight forwards completed");
    }
    admin_shutdown.cancel();

    match admin_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(e) => tracing::error!(error = %e, "Admin listener task failed"),
    }
    served
}

/// Public-listener service: dispatches to the webhook ingress or the
/// registration API.
#[derive(Clone)]
pub struct WebhookRouterService {
    router: Router,
    ingress: WebhookIngress,
    registration: RegistrationApi,
    max_body_bytes: usize,
}

impl WebhookRouterService {
    pub fn new(
        router: Router,
        ingress: WebhookIngress,
        registration: RegistrationApi,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            router,
            ingress,
            registration,
            max_body_bytes,
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(endpoint) = self.router.find_endpoint(&req) else {
            return make_boxed_error_response(StatusCode::NOT_FOUND);
        };

        let started = Instant::now();
        let inflight = InflightGuard::new();

        let response = self.dispatch(endpoint, req).await;

        drop(inflight);
        histogram!(
            REQUEST_DURATION,
            "endpoint" => endpoint.as_str(),
            "status" => response.status().as_u16().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    async fn dispatch<B>(&self, endpoint: Endpoint, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let query = parts.uri.query();

        match endpoint {
            Endpoint::WebhookVerify => self.ingress.verify(query),
            Endpoint::WebhookEvent => match read_body(body, self.max_body_bytes).await {
                Ok(bytes) => self.ingress.receive(&parts.headers, bytes),
                Err(response) => response,
            },
            Endpoint::ListTenants => self.registration.list().await,
            Endpoint::RegisterTenant => match read_body(body, self.max_body_bytes).await {
                Ok(bytes) => self.registration.register(bytes).await,
                Err(response) => response,
            },
            Endpoint::DeactivateTenant => self.registration.deactivate(query).await,
        }
    }
}

/// Holds one unit of the inflight gauge. Released on drop, so a request
/// future cancelled by hyper still decrements.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

impl Service<Request<Incoming>> for WebhookRouterService {
    type Response = Response<ResponseBody>;
    type Error = WebhookRouterError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
