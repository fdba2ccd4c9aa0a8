//! Data Transfer Objects (DTOs) for application registration and listing.
//!
//! This module defines structures used to transfer application data between
//! the gateway API and its consumers, and to expose the schemas in the API
//! documentation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Registration request accepted by `POST /build/lambda`.
///
/// # Fields
///
/// - `project_path`: Directory holding the application sources.
/// - `app_name`: Unique, URL-safe application name.
/// - `framework`: One of `nextjs`, `vite`, or `react`.
/// - `env_vars`: Variables injected as image build arguments.
/// - `port`: Optional pinned host port; allocated when absent.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BuildRequestDTO {
    /// Directory holding the application sources.
    pub project_path: String,

    /// Unique, URL-safe application name.
    pub app_name: String,

    /// Framework tag: `nextjs`, `vite`, or `react`.
    pub framework: String,

    /// Variables injected as image build arguments.
    #[serde(default)]
    pub env_vars: HashMap<String, String>,

    /// Optional pinned host port; allocated when absent.
    pub port: Option<u16>,
}

/// Registration outcome returned by `POST /build/lambda`.
///
/// The endpoint answers HTTP 200 in both cases; failure is carried in the
/// body.
#[derive(Debug, Serialize, Deserialize, ToSchema, Default)]
pub struct BuildResponseDTO {
    /// Whether the application was registered.
    pub success: bool,

    /// Failure description, present only when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One registered application as reported by `GET /apps`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Default)]
pub struct AppDTO {
    /// Application name.
    pub app_name: String,

    /// Publicly addressable URL of the application.
    pub url: String,

    /// Host port the application container is published on.
    pub port: u16,

    /// Framework tag.
    pub framework: String,

    /// Build-time environment supplied at registration.
    pub env_vars: HashMap<String, String>,

    /// `running` when a live container exists, `stopped` otherwise.
    pub status: String,
}

/// Response envelope of `GET /apps`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Default)]
pub struct AppListDTO {
    /// Registered applications in registration order.
    pub apps: Vec<AppDTO>,
}

/// Error payload returned by the proxy surface.
#[derive(Debug, Serialize, Deserialize, ToSchema, Default)]
pub struct ErrorDTO {
    /// Human-readable failure description.
    pub detail: String,
}
