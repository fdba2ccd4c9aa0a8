//! # Server Module
//!
//! This module provides the entry point for the gateway, including
//! configuration loading, environment variable overrides, and the web
//! server bootstrap process.
//!
//! ## Overview
//!
//! The server module is responsible for:
//!
//! - Initializing the logger
//! - Loading the configuration from YAML files and environment variables
//! - Bootstrapping the web server
//!
//! ## Configuration
//!
//! The server module loads its configuration from the following sources,
//! in order of precedence:
//!
//! 1. Environment variables
//! 2. CLI parameters
//! 3. YAML configuration file
//!
//! The configuration is represented by the `Settings` struct, which is
//! serialized and deserialized using `serde`.

use crate::cmd::root::Cli;
use crate::settings::Settings;
use clap::Parser;
use colored::Colorize;
use env_logger::{Builder, Env};
use std::io::Write;
use thiserror::Error;

/// Represents the high-level server controller responsible for
/// loading configuration and running the application.
///
/// This structure encapsulates CLI arguments and server settings.
#[derive(Clone)]
pub struct Server {
    running: bool,
    args: Option<Cli>,
    settings: Option<Settings>,
}

impl Server {
    /// Performs pre-flight initialization tasks such as configuring the
    /// server logger and printing out the ASCII art banner. This function
    /// is called once during server startup, before the server starts
    /// accepting requests.
    fn preflight(app_version: String, banner: Option<String>) {
        // Configure server logger
        Server::configure_log();

        let ascii_art = r#"
           __                 __        __                ___
          / /  ___ _ __ _  __/ /  ___ _/ /__ ____ ___ _  / _ \___ _/ /____ _    _____ ___ __
         / /__/ _ `//  ' \/ _  /  / _ `/___// _ `/ _ `/ / // / _ `/ __/ -_) |/|/ / _ `/ // /
        /____/\_,_//_/_/_/\_,_/   \_,_/     \_, /\_,_/  \___/\_,_/\__/\__/|__,__/\_,_/\_, /
                                           /___/                                     /___/
        "#;

        if let Some(banner) = banner
            && !banner.is_empty()
        {
            println!("{}", banner);
        } else {
            println!("{}", ascii_art);
        }

        println!(
            "\t{} {}\n\t{} {}\n",
            "License:".green(),
            env!("CARGO_PKG_LICENSE").bright_blue(),
            "Gateway Version:".green(),
            app_version.bright_blue(),
        );
    }

    /// Creates a new empty `Server` instance with no configuration loaded.
    ///
    /// Useful as the starting point for building and initializing
    /// the server lifecycle.
    pub fn new(app_version: String, banner: Option<String>) -> Self {
        Server::preflight(app_version, banner);

        Server {
            running: false,
            args: None,
            settings: None,
        }
    }

    /// Loads CLI arguments and resolves the application configuration.
    ///
    /// This method parses command-line arguments, attempts to load the
    /// server settings, and stores both inside the `Server` instance.
    ///
    /// # Returns
    /// The updated `Server` instance.
    pub async fn init(mut self) -> Result<Self> {
        let args = Cli::parse();
        let settings =
            Cli::load_config(&args).map_err(|e| ServerError::Configuration(e.to_string()))?;

        self.settings = Some(settings);
        self.args = Some(args);

        Ok(self)
    }

    /// Configures and initializes the application logger.
    ///
    /// This method sets up the logger using environment variables, applying
    /// a default log level configuration when none is provided. It defines
    /// a custom log format with colored log levels, timestamps, module
    /// paths, and messages to improve readability during development and
    /// debugging.
    ///
    /// # Behavior
    ///
    /// - Uses `RUST_LOG` environment variable when available.
    /// - Defaults to `info` level and suppresses noisy logs from `actix_web`
    ///   and `actix_web_prom`.
    /// - Applies colorized output based on the log level.
    /// - Formats log entries with timestamp, level, module path, and message.
    fn configure_log() {
        // Initialize Logger ENV
        let level = Env::default().default_filter_or("info,actix_web=error,actix_web_prom=error");

        let _ = Builder::from_env(level)
            .format(|buf, record| {
                let level = match record.level() {
                    log::Level::Info => record.level().as_str().bright_green(),
                    log::Level::Debug => record.level().as_str().bright_blue(),
                    log::Level::Trace => record.level().as_str().bright_cyan(),
                    log::Level::Warn => record.level().as_str().bright_yellow(),
                    log::Level::Error => record.level().as_str().bright_red(),
                };

                let datetime = chrono::Local::now()
                    .format("%d-%m-%YT%H:%M:%S%.3f%:z")
                    .to_string()
                    .white();

                // Align timestamp, level, and module path
                writeln!(
                    buf,
                    "{:<24}  {:<5} [{:<40}] - {}",
                    datetime,                                         // Timestamp
                    level,                                            // Log level
                    record.module_path().unwrap_or("unknown").blue(), // Module path
                    record.args()                                     // Log message
                )
            })
            .try_init();
    }

    /// Executes the gateway using the previously loaded settings and CLI
    /// input.
    ///
    /// If both arguments and settings are available, this method delegates
    /// execution to the CLI dispatcher, starting the server workflow.
    pub async fn run(&self) {
        if self.running {
            tracing::warn!("The server is already running and cannot be started again.");
            return;
        }

        if let (Some(args), Some(settings)) = (&self.args, &self.settings) {
            Cli::init(args, settings).await;
        }
    }
}

/// A type alias for a `Result` with the `ServerError` error type.
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid server configuration: {0}")]
    Configuration(String),

    #[error("Tokio runtime not found. Details: {0}")]
    RuntimeNotFound(String),
}
