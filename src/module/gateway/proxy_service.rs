//! Request forwarding.
//!
//! Rewrites inbound paths according to the application's framework,
//! forwards the request to the container, and sanitizes hop-by-hop
//! headers in both directions.

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use tracing::debug;

use super::{GatewayError, GatewayState, Result};
use crate::module::registry::AppDescriptor;

/// Hop-by-hop headers never forwarded to the upstream. `host` is included
/// so the upstream sees its own authority, not the gateway's.
static HOP_BY_HOP: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailers",
        "transfer-encoding",
        "upgrade",
        "host",
    ])
});

/// Response headers the gateway re-derives itself and therefore strips.
static RESPONSE_STRIP: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["content-encoding", "transfer-encoding", "connection"]));

/// Whether a request header is dropped before forwarding.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.contains(name.to_ascii_lowercase().as_str())
}

/// Whether a response header is dropped before answering the client.
pub fn strips_from_response(name: &str) -> bool {
    RESPONSE_STRIP.contains(name.to_ascii_lowercase().as_str())
}

/// Composes the upstream URL for a proxied request.
///
/// Static frameworks serve from `/`, so the `/app/<name>` prefix is
/// stripped. Next.js was built with `BASE_PATH=/app/<name>` and receives
/// the full path verbatim.
pub fn upstream_url(descriptor: &AppDescriptor, tail: &str, query: &str) -> String {
    let mut url = if descriptor.framework.is_static() {
        format!("http://127.0.0.1:{}/{}", descriptor.host_port, tail)
    } else {
        format!(
            "http://127.0.0.1:{}{}/{}",
            descriptor.host_port,
            descriptor.base_path(),
            tail
        )
    };

    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }

    url
}

/// Forwards one request to the application container and returns the
/// upstream response with filtered headers.
///
/// Transport failures evict the handle (the container is presumed dead)
/// and map to 503; upstream timeouts keep the handle and map to 504.
pub async fn forward(
    state: &GatewayState,
    descriptor: &AppDescriptor,
    container_id: &str,
    req: &HttpRequest,
    tail: &str,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let url = upstream_url(descriptor, tail, req.query_string());
    debug!("Forwarding {} {} -> {}", req.method(), req.path(), url);

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| GatewayError::Proxy(e.to_string()))?;

    let mut builder = state
        .client
        .request(method, url.as_str())
        .timeout(state.config.upstream_timeout);

    for (name, value) in req.headers() {
        // content-length is re-derived from the forwarded body.
        if !is_hop_by_hop(name.as_str()) && name != actix_web::http::header::CONTENT_LENGTH {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
    }

    let upstream = match builder.body(body.to_vec()).send().await {
        Ok(response) => response,
        Err(reqwest_middleware::Error::Reqwest(e)) if e.is_timeout() => {
            return Err(GatewayError::UpstreamTimeout(descriptor.app_name.clone()));
        }
        Err(reqwest_middleware::Error::Reqwest(e)) if e.is_connect() => {
            // The handle points at a dead container; drop it so the next
            // request warms a fresh one.
            state
                .lifecycle
                .evict(&descriptor.app_name, container_id)
                .await;
            return Err(GatewayError::UpstreamUnreachable(
                descriptor.app_name.clone(),
            ));
        }
        Err(e) => return Err(GatewayError::Proxy(e.to_string())),
    };

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| GatewayError::Proxy(e.to_string()))?;

    let mut response = HttpResponse::build(status);
    for (name, value) in upstream.headers() {
        // content-length is re-derived from the returned body.
        if !strips_from_response(name.as_str())
            && name != reqwest::header::CONTENT_LENGTH
        {
            response.append_header((name.as_str(), value.as_bytes()));
        }
    }

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| GatewayError::Proxy(e.to_string()))?;

    Ok(response.body(bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::registry::Framework;
    use crate::test::descriptor_for;

    #[test]
    fn static_frameworks_lose_the_base_path_prefix() {
        let vite = descriptor_for("shop", Framework::Vite, 3500);
        assert_eq!(
            upstream_url(&vite, "assets/index.css", ""),
            "http://127.0.0.1:3500/assets/index.css"
        );
        assert_eq!(upstream_url(&vite, "", ""), "http://127.0.0.1:3500/");

        let react = descriptor_for("shop", Framework::React, 3500);
        assert_eq!(
            upstream_url(&react, "index.html", "v=1"),
            "http://127.0.0.1:3500/index.html?v=1"
        );
    }

    #[test]
    fn nextjs_keeps_the_full_path_and_query() {
        let next = descriptor_for("dash", Framework::Nextjs, 3501);
        assert_eq!(
            upstream_url(&next, "api/x", "k=1"),
            "http://127.0.0.1:3501/app/dash/api/x?k=1"
        );
        assert_eq!(
            upstream_url(&next, "", ""),
            "http://127.0.0.1:3501/app/dash/"
        );
    }

    #[test]
    fn hop_by_hop_headers_are_recognized_case_insensitively() {
        for name in [
            "connection",
            "Keep-Alive",
            "PROXY-AUTHENTICATE",
            "proxy-authorization",
            "te",
            "Trailers",
            "transfer-encoding",
            "Upgrade",
            "Host",
        ] {
            assert!(is_hop_by_hop(name), "{name} should be stripped");
        }

        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("authorization"));
        assert!(!is_hop_by_hop("x-request-id"));
    }

    #[test]
    fn response_strip_set_is_exact() {
        assert!(strips_from_response("Content-Encoding"));
        assert!(strips_from_response("transfer-encoding"));
        assert!(strips_from_response("Connection"));
        assert!(!strips_from_response("content-type"));
        assert!(!strips_from_response("set-cookie"));
    }
}
