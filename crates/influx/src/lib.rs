//! InfluxDB query execution for speed-test telemetry.
//!
//! This crate provides:
//! - [`QueryExecutor`], the seam the alert engine queries through
//! - [`InfluxClient`], an InfluxQL-over-HTTP implementation
//! - Parsing of InfluxQL JSON responses into [`speedwatch_core::Row`]s

pub mod client;
pub mod config;
pub mod executor;
pub mod result;

pub use client::InfluxClient;
pub use config::InfluxConfig;
pub use executor::{QueryError, QueryExecutor};
pub use result::{InfluxResponse, Series};
