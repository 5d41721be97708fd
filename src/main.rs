mod db;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use actix_web::{web, App, HttpServer};
use std::env;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::services::maintenance::MaintenanceService;

const CART_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const METRICS_REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

// With the sea-orm `mock` feature (enabled via dev-dependencies during
// `cargo test`), `DatabaseConnection` is not `Clone`, so this fn only
// compiles outside the test harness. It is never executed by tests.
#[cfg(not(test))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("connecting to database");
    let db = db::establish_connection()
        .await
        .expect("Failed to connect to database");
    tracing::info!("database connected");

    let sweeper_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CART_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match MaintenanceService::cleanup_expired_carts(&sweeper_db).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired anonymous carts removed"),
                Err(e) => tracing::error!("cart cleanup failed: {}", e),
            }
        }
    });

    let metrics_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            match MaintenanceService::refresh_all_course_metrics(&metrics_db).await {
                Ok(count) => tracing::info!(count, "course metrics refreshed"),
                Err(e) => tracing::error!("course metrics refresh failed: {}", e),
            }
        }
    });

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    tracing::info!(%bind_addr, "starting server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db.clone()))
            .configure(routes::configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
