//! # Lambda Gateway
//!
//! **Lambda Gateway** is a serverless-style gateway for containerized web
//! frontends. A registration request supplies a project directory, a
//! framework tag, and environment variables; the gateway builds a container
//! image for it and thereafter routes incoming HTTP traffic at
//! `/app/<name>/...` to an on-demand container instance. Containers are
//! started lazily on the first request for an application, multiplexed
//! across subsequent requests, and torn down after an idle interval.
//!
//! ## Features
//!
//! - **Cold-start-aware reverse proxy**
//!   - The first request for an application warms its container and is held
//!     until the containerized service answers a readiness probe
//!   - A thundering herd of first hits starts exactly one container per
//!     application, serialized by a per-application mutex
//!   - Idle containers are reaped by a cooperative background task
//!
//! - **Framework-aware routing**
//!   - `vite`/`react` assets are served from `/` inside the container, so
//!     the `/app/<name>` prefix is stripped before forwarding
//!   - `nextjs` applications are built with `BASE_PATH=/app/<name>` and
//!     receive the full path verbatim
//!
//! - **Multi-source configuration management**
//!   - Embedded YAML defaults merged with CLI-provided files, Base64
//!     overlays, and environment variables using [`config`]
//!   - Command-line parameter parsing using [`clap`]
//!   - Automatic deserialization into strongly typed structures using
//!     [`serde`]
//!
//! - **Web server initialization**
//!   - HTTP server powered by [`actix_web`]
//!   - Asynchronous runtime handled by [`tokio`]
//!   - Container engine access through [`bollard`]
//!
//! ## Configuration System
//!
//! Configuration sources follow a layered precedence model:
//!
//! ```text
//! Environment variables > CLI parameters > YAML configuration file
//! ```
//!
//! After loading the configuration, the gateway exposes a typed `Settings`
//! instance for application modules and endpoint handlers.
#![deny(clippy::unwrap_used)]
#![deny(clippy::redundant_clone)]

mod cmd;
pub mod dto;
mod http;
mod metrics;
pub mod module;
mod server;
pub mod settings;
pub mod test;

#[derive(rust_embed::Embed)]
#[folder = "assets"]
pub struct Asset;

pub use server::Result;
pub use server::Server;
pub use server::ServerError;

/// Starts the gateway: builds the runtime, loads the configuration, and
/// blocks until shutdown.
pub fn start_server() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| ServerError::RuntimeNotFound(e.to_string()))?;

    runtime.block_on(async {
        let server = Server::new(env!("CARGO_PKG_VERSION").to_string(), None)
            .init()
            .await?;
        server.run().await;
        Ok(())
    })
}
