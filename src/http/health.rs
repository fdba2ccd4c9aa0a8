use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use actix_web::{HttpResponse, get, web::ServiceConfig};
use serde_json::to_string_pretty;

/// Basic health-check response model.
///
/// Returned by the `/actuator/health` endpoint to indicate the
/// operational status of the gateway.
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: String,
}

/// OpenAPI documentation definition for the health surface.
///
/// This object aggregates exposed paths, components and
/// tags used to generate the API specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "🌐 Lambda Gateway",
    ),
    paths(
        health
    ),
    components(
        schemas(HealthResponse)
    ),
    tags(
        (name = "⚙️ Gateway Actuator", description = "Gateway health and diagnostics.")
    ),
)]
pub(crate) struct HealthApiDoc;

/// Health-check endpoint for the gateway.
///
/// This endpoint provides a simple mechanism for external systems or load
/// balancers to verify that the gateway is running correctly. When invoked,
/// it returns a JSON payload indicating the application's status, along
/// with an additional custom header.
///
/// # Response
/// Returns an **HTTP 200 OK** response with:
///
/// - **Content-Type:** `application/json`
/// - **Header:** `lambda-gateway: on-line`
/// - **Body:** A JSON object in the form:
///
/// ```json
/// {
///   "status": "UP"
/// }
/// ```
#[utoipa::path(
    tag = "✅ Gateway Health Check",
    responses(
        (status = 200, description= "Gateway Health Check Status", body = HealthResponse),
    )
)]
#[get("/actuator/health")]
async fn health() -> HttpResponse {
    let body = to_string_pretty(&HealthResponse {
        status: "UP".to_string(),
    });
    HttpResponse::Ok()
        .content_type("application/json")
        .append_header(("lambda-gateway", "on-line"))
        .body(body.unwrap_or_default())
}

/// Configures the base server settings by registering core services.
///
/// Registers the health-check route, which provides a lightweight way for
/// monitoring systems to verify that the gateway is running.
pub(crate) fn configure_server_base(cfg: &mut ServiceConfig) {
    // Add health check endpoint
    cfg.service(health);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn health_endpoint_reports_up() {
        let server = test::init_service(App::new().configure(configure_server_base)).await;

        let request = test::TestRequest::get().uri("/actuator/health").to_request();
        let res = test::call_service(&server, request).await;
        assert_eq!(res.status().as_u16(), 200);

        let body = test::read_body(res).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
        assert_eq!(json["status"], "UP");
    }
}
