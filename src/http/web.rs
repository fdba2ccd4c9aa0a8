//! # HTTP Web Module
//!
//! This module is responsible for initializing and starting the main
//! gateway server and the health-check server.
//!
//! It provides a single entry point, `bootstrap_server`, which bootstraps
//! the Actix-Web infrastructure of the application: it connects to the
//! container engine, wires the gateway state (registry, build pipeline,
//! lifecycle engine), spawns the idle reaper, and runs the primary gateway
//! server next to the lightweight health-check server.
//!
//! ## Main Function
//!
//! `bootstrap_server`: Initializes and starts the main gateway server and
//! the health-check server.
//!
//! **Arguments:**
//!
//! `settings`: Reference to the application's runtime configuration,
//! including server settings such as host, ports, worker count, and the
//! gateway tuning section.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Condition;
use actix_web::{App, HttpServer, middleware::Logger, web};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use colored::Colorize;
use prometheus::Registry;
use prometheus::process_collector::ProcessCollector;
use thiserror::Error;
use utoipa::OpenApi;

use tokio::join;
use utoipa_swagger_ui::{Config, SwaggerUi};

use crate::http::health::{HealthApiDoc, configure_server_base};
use crate::metrics::GatewayCollector;
use crate::module::gateway::gateway_controller::{self, GatewayApiDoc};
use crate::module::gateway::GatewayState;
use crate::module::lifecycle::reaper;
use crate::module::runtime::DockerRuntime;
use crate::settings::Settings;

/// Initializes and starts the main gateway server and the health-check
/// server.
///
/// # Parameters
/// - `settings`: Reference to the application's runtime configuration.
///
/// # Behavior
/// - Connects to the container engine and wires the gateway state.
/// - Spawns the idle reaper task.
/// - Launches two Actix-Web servers:
///   1. **Main Gateway Server**
///      - Uses the host and port defined in the settings.
///      - Applies CORS configuration.
///      - Registers the registration, listing, proxy, and fallback routes.
///   2. **Health Check Server**
///      - Runs independently with a dedicated port.
///      - Registers the base server configuration (e.g., `/actuator/health`)
///        and the Swagger UI.
/// - Awaits both servers concurrently; on shutdown the reaper is stopped
///   and every live container is stopped and removed.
///
/// # Notes
/// - This function blocks the current task until both servers shut down.
pub(crate) async fn bootstrap_server(settings: &Settings) -> Result<()> {
    let server_config = settings
        .server
        .as_ref()
        .ok_or_else(|| HttpServerError::Configuration("Missing server configuration.".into()))?;

    // Get the thread count to configure server workers
    let num_threads = std::thread::available_parallelism().map_or_else(|_| 1, |p| p.get());

    // Check the server host
    let host = server_config
        .host
        .clone()
        .ok_or_else(|| HttpServerError::Configuration("Missing server host.".into()))?;

    // Connect to the container engine and wire the gateway components
    let runtime = DockerRuntime::connect()
        .map_err(|e| HttpServerError::Bootstrap(e.to_string()))?;
    let state = web::Data::new(GatewayState::new(
        Arc::new(runtime),
        settings.gateway_config(),
    ));

    // Configure Prometheus Metrics
    let (health_metrics_enabled, prometheus_health) =
        configure_prometheus(settings, &state, true)?;
    let (metrics_enabled, prometheus) = configure_prometheus(settings, &state, false)?;

    // Background reaper for idle containers
    let reaper_task = reaper::spawn(Arc::clone(&state.lifecycle));

    // Configure the Main Gateway Server
    //
    let server_settings = settings.clone();
    let main_state = state.clone();
    let mut main_server_builder = HttpServer::new(move || {
        // Configure Main Server Cors Config
        let cors_config = configure_cors(&server_settings);

        // Create the Prometheus condition based on settings
        let metrics_condition = Condition::new(metrics_enabled, prometheus.clone());

        App::new()
            .app_data(main_state.clone())
            .wrap(cors_config)
            .wrap(metrics_condition)
            .wrap(Logger::default())
            .configure(gateway_controller::configure)
    })
    .bind((host.clone(), server_config.port))
    .map_err(|e| HttpServerError::Bootstrap(e.to_string()))?
    .workers(server_config.workers.unwrap_or(num_threads))
    .shutdown_timeout(60);

    // Configure the Health Server
    //
    let mut health_server_builder = HttpServer::new(move || {
        // Configure OpenApi Doc
        let health_openapi = HealthApiDoc::openapi();
        let gateway_openapi = GatewayApiDoc::openapi();

        // Create the Prometheus condition based on settings
        let metrics_condition = Condition::new(health_metrics_enabled, prometheus_health.clone());

        // Create the Health Check and Metrics Server App
        App::new()
            .wrap(metrics_condition)
            .configure(configure_server_base)
            .service(
                SwaggerUi::new("/actuator/swagger-ui/{_:.*}")
                    .url("/actuator/api-docs/openapi.json", health_openapi)
                    .url("/actuator/api-docs/gateway.json", gateway_openapi)
                    .config(Config::default().validator_url("none")),
            )
    })
    .bind((host, server_config.health_check_port))
    .map_err(|e| HttpServerError::Bootstrap(e.to_string()))?
    .workers(server_config.health_check_workers.unwrap_or(num_threads))
    .shutdown_timeout(60);

    // Configure server workers if provided
    if let Some(workers) = settings.server.as_ref().and_then(|s| s.workers) {
        main_server_builder = main_server_builder.workers(workers);
        health_server_builder = health_server_builder.workers(workers);
    }
    let main_server = main_server_builder.run();
    let health_server = health_server_builder.run();

    tracing::info!(
        "{} {}. {} {}.",
        "Gateway listening on port".bright_green(),
        server_config.port.to_string().bright_blue(),
        "The Health Check port is".bright_green(),
        server_config.health_check_port.to_string().bright_blue()
    );

    let (_, _) = join!(health_server, main_server);

    // Stop the reaper and tear down every live container before exiting.
    reaper_task.abort();
    state.lifecycle.shutdown().await;

    Ok(())
}

/// Configures a Prometheus metrics collector based on the provided settings.
///
/// This function takes the application settings as input and returns a tuple
/// containing a boolean indicating whether metrics collection is enabled
/// and a `PrometheusMetrics` instance configured with the application
/// name and endpoint.
///
/// The `PrometheusMetrics` instance is configured with the following settings:
/// - The application name is used as the prefix for all exposed metrics.
/// - The `"/metrics"` endpoint is used to expose the metrics.
/// - The Swagger UI endpoints are excluded from metrics collection.
///
/// # Errors
///
/// This function will return an error if either the ProcessCollector or
/// GatewayCollector fails to register.
fn configure_prometheus(
    settings: &Settings,
    state: &web::Data<GatewayState>,
    base: bool,
) -> Result<(bool, PrometheusMetrics)> {
    // Get metrics parameters
    let metrics_cfg = settings.metrics.as_ref();
    let metrics_enabled = metrics_cfg.and_then(|m| m.enabled).unwrap_or(false);
    let metrics_app_name = metrics_cfg
        .and_then(|m| m.app_name.clone())
        .unwrap_or_else(|| "gateway".to_string());

    // Metrics registry
    let registry = build_metrics_registry(&metrics_app_name, state)?;

    let endpoint = if base {
        "/actuator/metrics"
    } else {
        "/metrics"
    };
    let prometheus = PrometheusMetricsBuilder::new(&metrics_app_name)
        .endpoint(endpoint)
        .exclude_regex("^/swagger-ui/.*")
        .exclude_regex("^/actuator/swagger-ui/.*")
        .registry(registry)
        .build()
        .map_err(|e| HttpServerError::Bootstrap(e.to_string()))?;

    Ok((metrics_enabled, prometheus))
}

/// Builds a Prometheus registry with the given application name.
///
/// The registry is initialized with both the ProcessCollector and the
/// GatewayCollector. The ProcessCollector exposes process metrics, such
/// as memory and CPU usage. The GatewayCollector exposes gateway state:
/// registered applications and live containers.
///
/// # Errors
///
/// This function will return an error if either the ProcessCollector or
/// GatewayCollector cannot be registered with the registry.
fn build_metrics_registry(
    app_name: &str,
    state: &web::Data<GatewayState>,
) -> Result<Registry> {
    let pid = std::process::id() as i32;
    let registry = Registry::default();

    registry
        .register(Box::new(ProcessCollector::new(pid, app_name.to_string())))
        .map_err(|e| HttpServerError::Configuration(e.to_string()))?;

    let collector = GatewayCollector::new(
        Arc::clone(&state.registry),
        Arc::clone(&state.lifecycle),
        app_name.to_string(),
    )
    .map_err(|e| HttpServerError::Configuration(e.to_string()))?;

    registry
        .register(Box::new(collector))
        .map_err(|e| HttpServerError::Configuration(e.to_string()))?;

    Ok(registry)
}

/// Builds and returns a CORS configuration based on the server settings.
///
/// This function reads the CORS options defined in the application
/// configuration and applies rules for allowed origins, methods, headers,
/// and credentials. When no CORS configuration is provided, a permissive
/// default policy is applied.
///
/// # Parameters
/// - `settings`: Reference to the application settings used to load
///   CORS rules.
///
/// # Returns
/// A configured [`Cors`] instance ready to be applied to an Actix-Web
/// application.
fn configure_cors(settings: &Settings) -> Cors {
    if let Some(cors_config) = settings.server.as_ref().and_then(|sc| sc.cors.as_ref()) {
        let mut cors = Cors::default();

        // Configure CORS origins
        if let Some(pattern) = &cors_config.allowed_origins_pattern {
            let origins = pattern.split(',').collect::<Vec<&str>>();
            if origins.len() == 1 && origins[0].trim() == "*" {
                cors = cors.allow_any_origin();
            } else {
                for origin in origins {
                    cors = cors.allowed_origin(origin.trim());
                }
            }
        };

        // Configure CORS Allowed Headers
        if let Some(allowed_headers) = &cors_config.allowed_headers {
            let headers = allowed_headers.split(',').collect::<Vec<&str>>();
            if headers.len() == 1 && headers[0].trim() == "*" {
                cors = cors.allow_any_header()
            } else {
                for header in headers {
                    cors = cors.allowed_header(header.trim());
                }
            }
        }

        // Configure CORS Allowed Methods
        match &cors_config.allowed_methods {
            Some(allowed_methods) if allowed_methods.trim() != "*" => {
                let methods = allowed_methods
                    .split(',')
                    .map(|m| m.trim())
                    .collect::<Vec<&str>>();
                cors = cors.allowed_methods(methods);
            }
            _ => cors = cors.allow_any_method(),
        }

        // Configure CORS credentials support
        if cors_config.allow_credentials.unwrap_or(false) {
            cors = cors.supports_credentials();
        }

        if let Some(max_age) = cors_config.max_age {
            cors = cors.max_age(max_age as usize);
        }

        cors
    } else {
        Cors::permissive()
    }
}

/// A type alias for a `Result` with the `HttpServerError` error type.
pub type Result<T, E = HttpServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum HttpServerError {
    #[error("Invalid HTTP server configuration: {0}")]
    Configuration(String),

    #[error("Error initializing the HTTP server: {0}")]
    Bootstrap(String),
}
