// src/main.rs
//! binstow: 3D strip- and bin-packing service
//!
//! A deterministic placement oracle, a simulated-annealing search, and (for
//! bin packing) an initial MILP assignment over axis-aligned cuboids.

mod annealer;
mod api;
mod assignment;
mod config;
mod error;
mod geometry;
mod model;
mod oracle;
mod score;
mod solver;
pub mod types;

use config::AppConfig;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("could not load .env: {err}");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app_config = AppConfig::from_env();

    tracing::info!("packing service starting");
    api::start_api_server(app_config.api, app_config.solver, app_config.assignment).await;
}
