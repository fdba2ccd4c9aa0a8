//! Root command provides the command-line interface for this application.
//! It defines all supported flags, arguments, and subcommands.
//!
//! # Command-Line Parameters
//!
//! The application exposes several optional and required command-line
//! parameters. These parameters are parsed at runtime and control the
//! behavior of the tool.
//!
//! ## Global Flags
//!
//! `--config-file <path>`
//! Specifies the path to the configuration file. If omitted, the
//! application falls back to the embedded default configuration.
//!
//! `--b64-config-file <data>`
//! A YAML configuration passed inline as Base64, merged over the
//! defaults. Useful for container deployments without mounted files.
//!
//! ## Notes
//!
//! - All commands support the standard `--help` flag, which displays
//!   contextual help.
use crate::Asset;
use crate::cmd::run::{RunArgs, process_command};
use crate::cmd::style;
use crate::cmd::style::CURRENT;
use crate::settings::Settings;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use clap::Parser;
use clap::Subcommand;
use colored::Colorize;
use config::{Case, Config, ConfigError, Environment, File, FileFormat};
use std::path::PathBuf;

/// Gateway CLI Clap root command.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
#[command(propagate_version = true)]
#[command(styles=style::CURRENT)]
#[command(help_template = Cli::help_template())]
pub(crate) struct Cli {
    /// Full path to the config.yaml file. This file will be merged with the default configuration.
    #[clap(short, long, env)]
    pub config_file: Option<PathBuf>,

    /// Yaml config file in Base64 format. This file will be merged with the default configuration
    #[clap(short, long, env)]
    pub b64_config_file: Option<String>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Starts the gateway and loads all necessary configurations before
    /// accepting incoming requests.
    Run(RunArgs),
}

impl Cli {
    /// Generates the formatted help template used by the CLI.
    ///
    /// This function returns a string that defines the structure of the help
    /// output, including version, author, usage, options, and available
    /// subcommands. It embeds dynamic header and context values for consistent
    /// styling across the CLI.
    ///
    /// # Returns
    /// A formatted `String` representing the CLI help template.
    fn help_template() -> String {
        format!(
            "\
        {header}Lambda Gateway version {{version}}\n\
        {header}Author:{context} {{author}}\n\n\
        {{about}}\n\n\
        {header}Usage: {{usage}}\n\n\
        {header}Options:\n{{options}}\n\n\
        {header}Commands:\n{{subcommands}}
        ",
            header = CURRENT.get_header(),
            context = CURRENT.get_context_value()
        )
    }

    /// Initializes the application based on the parsed CLI arguments.
    ///
    /// This function evaluates the command provided by the user and triggers
    /// the appropriate action. Currently, it supports the `run` command,
    /// which starts the gateway workflow.
    ///
    /// # Parameters
    /// - `args`: Parsed CLI arguments.
    /// - `settings`: Loaded application settings.
    pub(crate) async fn init(args: &Cli, settings: &Settings) {
        match &args.commands {
            Commands::Run(_) => process_command(settings).await,
        }
    }

    /// Loads the application configuration from multiple possible sources.
    ///
    /// This function assembles a configuration object using the following
    /// sources, in order:
    /// - Embedded `config.yaml`
    /// - CLI-provided config file
    /// - Base64-encoded config passed via CLI
    /// - Environment variables (UPPER_SNAKE_CASE)
    ///
    /// After merging all sources, it attempts to deserialize the resulting
    /// data into a [`Settings`] structure.
    ///
    /// # Parameters
    /// - `args`: CLI arguments containing optional config inputs.
    ///
    /// # Returns
    /// - `Ok(Settings)` on successful deserialization.
    /// - `Err(ConfigError)` containing the formatted error message otherwise.
    pub(crate) fn load_config(args: &Cli) -> std::result::Result<Settings, ConfigError> {
        let mut builder = Config::builder();

        // Get the embeded Yaml config file
        if let Some(file) = Asset::get("config.yaml") {
            let contents =
                std::str::from_utf8(&file.data).map_err(|e| ConfigError::Message(e.to_string()))?;

            builder = builder.add_source(File::from_str(contents, FileFormat::Yaml));
        }

        // Get the yaml config file from CLI parameter address
        if let Some(path) = &args.config_file
            && path.exists()
        {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        // Get the Base64 Yaml config file
        if let Some(data) = &args.b64_config_file {
            let decoded = BASE64_STANDARD
                .decode(data)
                .map_err(|e| ConfigError::Message(e.to_string()))?;

            let contents =
                std::str::from_utf8(&decoded).map_err(|e| ConfigError::Message(e.to_string()))?;

            builder = builder.add_source(File::from_str(contents, FileFormat::Yaml));
        }

        // Get config environment variables
        builder =
            builder.add_source(Environment::with_convert_case(Case::UpperSnake).separator("_"));

        // Build configuration and convert the server configuration
        let config = builder.build().map_err(build_error)?;
        config.try_deserialize::<Settings>().map_err(build_error)
    }
}

/// Builds a `ConfigError` message based on the given error.
///
/// This function is a utility used by the `load_config` method to format
/// configuration-related errors. It wraps the provided error in a
/// `ConfigError::Message` instance, prefixing it with a red "Failed to
/// build configuration. Root Cause:" message.
///
/// # Parameters
/// - `error`: The error to be formatted into a `ConfigError`.
///
/// # Returns
/// - `ConfigError` containing the formatted error message.
fn build_error<E: std::fmt::Display>(error: E) -> ConfigError {
    ConfigError::Message(format!(
        "{} {}",
        "Failed to build configuration. Root Cause:".red(),
        error.to_string().red()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_configuration_loads_gateway_defaults() {
        let args = Cli {
            config_file: None,
            b64_config_file: None,
            commands: Commands::Run(RunArgs {}),
        };

        let settings = Cli::load_config(&args).expect("embedded config must load");
        let gateway = settings.gateway_config();
        let server = settings.server.expect("server section");
        assert_eq!(server.port, 5500);
        assert_eq!(server.health_check_port, 5501);

        assert_eq!(gateway.base_port, 3500);
    }

    #[test]
    fn base64_configuration_overrides_defaults() {
        let overlay = "server:\n  port: 9000\n  health-check-port: 9001\n";
        let args = Cli {
            config_file: None,
            b64_config_file: Some(BASE64_STANDARD.encode(overlay)),
            commands: Commands::Run(RunArgs {}),
        };

        let settings = Cli::load_config(&args).expect("merged config must load");
        let server = settings.server.expect("server section");
        assert_eq!(server.port, 9000);
        assert_eq!(server.health_check_port, 9001);
    }
}
