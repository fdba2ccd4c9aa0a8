//! Run subcommand starts the gateway with a configuration based on
//! parameters, environment variables, or default config values.
//!
//! ## Run Subcommand
//!
//! Starts the gateway and loads all necessary configurations before
//! accepting incoming requests. This command initializes the application
//! runtime, connects to the container engine, sets up the API routes, and
//! begins listening on the configured host and port.
//!
//! ### Usage
//!
//! ```text
//! lambda-gateway run
//! ```

use crate::{http::web::bootstrap_server, settings::Settings};
use clap::Args;
use colored::Colorize;
use thiserror::Error;

/// Command-line arguments for starting the application.
///
/// This struct is derived from `clap::Args` and represents
/// the basic CLI parameters accepted by the `run` command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {}

/// Processes the run command using the provided settings.
///
/// This function triggers the server bootstrap routine and, at shutdown,
/// prints a success or failure message.
///
/// # Parameters
/// - `settings`: Reference to the gateway configuration.
pub async fn process_command(settings: &Settings) {
    if let Err(error) = try_process_command(settings).await {
        tracing::error!(
            "{} {}",
            "An unexpected error occurred on the gateway.".bright_red(),
            format!("Detail: {error:?}").red()
        );
    }
}

/// Attempts to bootstrap the gateway and waits for its shutdown.
///
/// # Parameters
/// - `settings`: Reference to the application [`Settings`] used during bootstrap.
///
/// # Returns
/// - `Ok(())` if the shutdown process completes successfully.
/// - A [`RunError`] if the server bootstrap fails.
async fn try_process_command(settings: &Settings) -> Result<()> {
    bootstrap_server(settings)
        .await
        .map_err(|e| RunError::RunError(e.to_string()))?;

    tracing::info!("{}", "Gateway successfully shut down.".bright_green().bold());

    Ok(())
}

/// A type alias for a `Result` with the `RunError` error type.
pub type Result<T, E = RunError> = std::result::Result<T, E>;

/// Represents an error that occurred during the server bootstrap process.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Error initializing the HTTP server. Detail: {0}")]
    RunError(String),
}
