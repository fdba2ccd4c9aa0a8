//! HTTP bootstrap layer: main gateway server and health-check server.

pub mod health;
pub mod web;
