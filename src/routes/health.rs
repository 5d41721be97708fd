use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;
use chrono::Utc;
use std::time::Instant;

use crate::models::health::HealthResponse;

/// Basic liveness check: 200 whenever the process is up.
#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "lms-backend".to_string(),
    })
}

/// Readiness check: verifies the database answers before traffic is routed.
#[get("/health/ready")]
pub async fn readiness_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    match db.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ready",
            "checks": { "database": true }
        })),
        Err(e) => {
            tracing::error!("readiness check - database error: {}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "not_ready",
                "checks": { "database": false },
                "errors": [format!("Database: {}", e)]
            }))
        }
    }
}

/// Detailed health for monitoring dashboards: latency and version info.
#[get("/health/detailed")]
pub async fn detailed_health(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let start = Instant::now();
    let database = match db.ping().await {
        Ok(()) => {
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            serde_json::json!({
                "status": "healthy",
                "latency_ms": (latency_ms * 100.0).round() / 100.0
            })
        }
        Err(e) => serde_json::json!({
            "status": "unhealthy",
            "error": e.to_string()
        }),
    };

    let healthy = database["status"] == "healthy";
    HttpResponse::Ok().json(serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": { "database": database }
    }))
}
