//! Gateway HTTP endpoints.
//!
//! Thin actix-web handlers over the registry, the build pipeline, and the
//! lifecycle engine. Contains no business logic beyond dispatch and the
//! composition of component errors into HTTP responses.

use std::collections::HashSet;

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use once_cell::sync::Lazy;
use tracing::{error, info};
use utoipa::OpenApi;

use super::{GatewayError, GatewayState, proxy_service};
use crate::dto::app::{AppDTO, AppListDTO, BuildRequestDTO, BuildResponseDTO, ErrorDTO};
use crate::module::registry::{AppDescriptor, AppRegistry, Framework};

/// File extensions served through the static-asset fallback.
static STATIC_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "svg", "png", "jpg", "jpeg", "gif", "ico", "webp", "woff", "woff2", "ttf", "eot",
    ])
});

/// OpenAPI documentation definition for the gateway API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "🌐 Lambda Gateway",
    ),
    paths(
        build_lambda_endpoint,
        get_apps_endpoint
    ),
    components(
        schemas(BuildRequestDTO, BuildResponseDTO, AppDTO, AppListDTO, ErrorDTO)
    ),
    tags(
        (name = "⚙️ Gateway API", description = "Application registration and routing.")
    ),
)]
pub(crate) struct GatewayApiDoc;

/// Registers the gateway routes.
///
/// The static-asset fallback is a catch-all and must stay last so the
/// fixed routes and the proxy prefix keep precedence.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(build_lambda_endpoint)
        .service(get_apps_endpoint)
        .service(app_root_redirect)
        .service(
            web::resource("/app/{app_name}/{path:.*}")
                .route(web::get().to(proxy_endpoint))
                .route(web::post().to(proxy_endpoint))
                .route(web::put().to(proxy_endpoint))
                .route(web::delete().to(proxy_endpoint))
                .route(web::patch().to(proxy_endpoint)),
        )
        .service(static_fallback_endpoint);
}

/// Endpoint for registering and building an application.
///
/// # HTTP Request
///
/// `POST /build/lambda HTTP/1.1`
///
/// # Request Body
///
/// The request body should contain a valid `BuildRequestDTO` object.
///
/// # Response
///
/// Always **HTTP 200**; the outcome is carried in the body as
/// `{"success": true}` or `{"success": false, "error": "..."}`. Failed
/// registrations never touch the registry.
#[utoipa::path(
    post,
    path = "/build/lambda",
    tag = "Register and build an application",
    responses(
        (status = 200, description = "Registration outcome.", body = BuildResponseDTO),
    )
)]
#[post("/build/lambda")]
pub async fn build_lambda_endpoint(
    state: web::Data<GatewayState>,
    payload: web::Json<BuildRequestDTO>,
) -> HttpResponse {
    match register_application(&state, payload.into_inner()).await {
        Ok(descriptor) => {
            info!(
                "Registered '{}' ({}) on port {}",
                descriptor.app_name, descriptor.framework, descriptor.host_port
            );
            HttpResponse::Ok().json(BuildResponseDTO {
                success: true,
                error: None,
            })
        }
        Err(error) => {
            error!("Error: {}", error);
            HttpResponse::Ok().json(BuildResponseDTO {
                success: false,
                error: Some(error),
            })
        }
    }
}

/// Validates the request, builds the image, and installs the descriptor.
async fn register_application(
    state: &GatewayState,
    request: BuildRequestDTO,
) -> Result<std::sync::Arc<AppDescriptor>, String> {
    AppRegistry::validate_name(&request.app_name).map_err(|e| e.to_string())?;
    let framework = Framework::parse(&request.framework).map_err(|e| e.to_string())?;

    if state.registry.get(&request.app_name).await.is_some() {
        return Err(format!(
            "Application '{}' is already registered",
            request.app_name
        ));
    }

    let image_ref = state
        .builder
        .build(
            &request.project_path,
            &request.app_name,
            framework,
            &request.env_vars,
        )
        .await
        .map_err(|e| e.to_string())?;

    let host_port = match request.port {
        Some(port) => port,
        None => state.registry.ports().next(),
    };

    let descriptor = state
        .registry
        .put(AppDescriptor {
            app_name: request.app_name.clone(),
            framework,
            host_port,
            env_vars: request.env_vars,
            image_ref,
        })
        .await
        .map_err(|e| e.to_string())?;

    state.lifecycle.register_app(&request.app_name).await;

    Ok(descriptor)
}

/// Endpoint for listing the registered applications.
///
/// # HTTP Request
///
/// `GET /apps HTTP/1.1`
///
/// # Response
///
/// The response body contains an `AppListDTO` with one entry per
/// registered application; `url` is derived from the request's base URL
/// and `status` reflects whether a live container exists.
#[utoipa::path(
    get,
    path = "/apps",
    tag = "List registered applications",
    responses(
        (status = 200, description = "Registered applications.", body = AppListDTO),
    )
)]
#[get("/apps")]
pub async fn get_apps_endpoint(
    state: web::Data<GatewayState>,
    req: HttpRequest,
) -> HttpResponse {
    let info = req.connection_info().clone();
    let mut apps = Vec::new();

    for descriptor in state.registry.list().await {
        let running = state.lifecycle.is_running(&descriptor.app_name).await;
        apps.push(AppDTO {
            app_name: descriptor.app_name.clone(),
            url: format!(
                "{}://{}{}",
                info.scheme(),
                info.host(),
                descriptor.base_path()
            ),
            port: descriptor.host_port,
            framework: descriptor.framework.to_string(),
            env_vars: descriptor.env_vars.clone(),
            status: if running { "running" } else { "stopped" }.to_string(),
        });
    }

    HttpResponse::Ok().json(AppListDTO { apps })
}

/// Redirects the bare application root to its slash-terminated form.
///
/// `GET /app/<name>` answers **HTTP 307** with `Location: /app/<name>/`
/// so relative asset URLs resolve under the application prefix.
#[get("/app/{app_name}")]
pub async fn app_root_redirect(path: web::Path<String>) -> HttpResponse {
    let app_name = path.into_inner();
    HttpResponse::TemporaryRedirect()
        .append_header((header::LOCATION, format!("/app/{}/", app_name)))
        .finish()
}

/// Catch-all proxy endpoint for `/app/<name>/<path>`.
///
/// Resolves the descriptor, asks the lifecycle engine for a ready
/// container (possibly warming one up inside this request), and forwards
/// the request with rewritten path and filtered headers.
pub async fn proxy_endpoint(
    state: web::Data<GatewayState>,
    path: web::Path<(String, String)>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let (app_name, tail) = path.into_inner();

    let Some(descriptor) = state.registry.get(&app_name).await else {
        return GatewayError::NotFound(app_name).error_response();
    };

    let container_id = match state
        .lifecycle
        .ensure_ready_detached(std::sync::Arc::clone(&descriptor))
        .await
    {
        Ok(id) => id,
        Err(error) => return GatewayError::from(error).error_response(),
    };

    match proxy_service::forward(&state, &descriptor, &container_id, &req, &tail, body).await {
        Ok(response) => response,
        Err(error) => error.error_response(),
    }
}

/// Fallback for top-level static asset requests.
///
/// Frontends that emit absolute asset URLs request `/<file.ext>` directly
/// from the gateway. The referer is inspected to guess the owning
/// application; without a match the first registered application is used.
/// Answers **HTTP 307** to `/app/<resolved>/<file.ext>`.
#[get("/{filename:.*}")]
pub async fn static_fallback_endpoint(
    state: web::Data<GatewayState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> HttpResponse {
    let filename = path.into_inner();

    if !is_static_asset(&filename) {
        return HttpResponse::NotFound().json(ErrorDTO {
            detail: "Not found".to_string(),
        });
    }

    let referer = req
        .headers()
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let Some(target) = state.registry.resolve_by_referer(referer).await else {
        return HttpResponse::NotFound().json(ErrorDTO {
            detail: format!("File '{}' not found", filename),
        });
    };

    HttpResponse::TemporaryRedirect()
        .append_header((header::LOCATION, format!("/app/{}/{}", target, filename)))
        .finish()
}

/// Whether the path names a static asset by extension.
fn is_static_asset(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| STATIC_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
