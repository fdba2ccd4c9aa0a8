//! Gateway façade and reverse proxy.
//!
//! Composes the registry, the build pipeline, and the lifecycle engine
//! behind the HTTP surface: the registration endpoint, the listing
//! endpoint, the catch-all proxy endpoint, the trailing-slash redirect,
//! and the static-asset fallback.

pub mod gateway_controller;
pub mod proxy_service;

use std::sync::Arc;

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use thiserror::Error;

use crate::dto::app::ErrorDTO;
use crate::module::build::BuildService;
use crate::module::lifecycle::{LifecycleError, LifecycleManager};
use crate::module::registry::AppRegistry;
use crate::module::runtime::ContainerRuntime;
use crate::settings::GatewayConfig;

/// A type alias for a `Result` with the `GatewayError` error type.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Errors surfaced by the proxy path.
///
/// Each variant maps to one HTTP status. Transport errors at warm-up and
/// at forward time evict the container handle so the next request retries
/// cold; a timeout of an already-warm container keeps the handle, since
/// the container may still be healthy.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The application is not registered.
    #[error("App '{0}' not found")]
    NotFound(String),

    /// The container never answered its readiness probe.
    #[error("{0}")]
    NotReady(String),

    /// The engine could not run the container.
    #[error("{0}")]
    Startup(String),

    /// The upstream connection was refused mid-request.
    #[error("Could not connect to '{0}'")]
    UpstreamUnreachable(String),

    /// The upstream did not answer within the forward timeout.
    #[error("Timeout connecting with '{0}'")]
    UpstreamTimeout(String),

    /// Anything else that broke while proxying.
    #[error("Proxy error: {0}")]
    Proxy(String),
}

impl GatewayError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Startup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UpstreamUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Proxy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error as its HTTP response.
    pub fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorDTO {
            detail: self.to_string(),
        })
    }
}

impl From<LifecycleError> for GatewayError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::NotReady { .. } => GatewayError::NotReady(error.to_string()),
            LifecycleError::Startup(_) => GatewayError::Startup(error.to_string()),
        }
    }
}

/// Shared state of the gateway, injected into every handler.
pub struct GatewayState {
    pub registry: Arc<AppRegistry>,
    pub lifecycle: Arc<LifecycleManager>,
    pub builder: BuildService,
    pub client: ClientWithMiddleware,
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Wires the gateway components around a container runtime.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: GatewayConfig) -> Self {
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(TracingMiddleware::default())
            .build();

        GatewayState {
            registry: Arc::new(AppRegistry::new(config.base_port)),
            lifecycle: Arc::new(LifecycleManager::new(Arc::clone(&runtime), config.clone())),
            builder: BuildService::new(runtime),
            client,
            config,
        }
    }
}
