//! The `style` module provides utilities for building terminal styles used
//! across the application. It leverages `clap::builder::Styles` and
//! `anstyle::Style` to define the color configuration applied to CLI
//! output, ensuring consistent and expressive formatting throughout
//! command-line help and error messages.

use clap::builder::Styles;

pub(crate) const CURRENT: Styles = default::DEFAULT;

/// Defines the default color palette and style configuration for the CLI.
///
/// This module offers a set of color and text-style constants used for
/// rendering help messages, errors, warnings, and contextual information.
/// It also provides `DEFAULT`, a predefined `Styles` set used by `clap`
/// for standard output formatting.
pub(crate) mod default {
    use anstyle::{AnsiColor, Effects, Style};
    use clap::builder::Styles;

    pub(crate) const HEADER: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);
    pub(crate) const USAGE: Style = AnsiColor::BrightYellow.on_default().effects(Effects::BOLD);
    pub(crate) const LITERAL: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    pub(crate) const PLACEHOLDER: Style = AnsiColor::BrightBlue.on_default();
    pub(crate) const CONTEXT: Style = AnsiColor::White.on_default();
    pub(crate) const CONTEXT_VALUE: Style = AnsiColor::BrightWhite.on_default();
    pub(crate) const ERROR: Style = AnsiColor::Red.on_default();
    pub(crate) const VALID: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    pub(crate) const INVALID: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);

    /// Default CLI color style.
    pub(crate) const DEFAULT: Styles = Styles::styled()
        .header(HEADER)
        .usage(USAGE)
        .literal(LITERAL)
        .placeholder(PLACEHOLDER)
        .error(ERROR)
        .valid(VALID)
        .invalid(INVALID)
        .context(CONTEXT)
        .context_value(CONTEXT_VALUE);
}
