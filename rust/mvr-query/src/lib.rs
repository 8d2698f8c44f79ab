//! Builds injection-safe, parameterised SQL for grouped counts and raw record
//! listings over the motor vehicle register table.
//!
//! [`query::build_query`] is the pure core: it validates every referenced
//! column against a [`schema::SchemaSnapshot`], compiles filters into `$n`
//! placeholders and returns the statement with its ordered bind values. The
//! HTTP service in [`server`] wraps it with configuration, a schema cache and
//! the per-mode row-limit policy.

pub mod config;
pub mod error;
pub mod form;
pub mod query;
pub mod schema;
pub mod server;
pub mod state;
pub mod telemetry;

use crate::{config::AppConfig, server::Server};

/// Bootstraps the translation service using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config).run().await
}
