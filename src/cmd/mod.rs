//! Command-line interface of the gateway.

pub(crate) mod root;
pub(crate) mod run;
pub(crate) mod style;
