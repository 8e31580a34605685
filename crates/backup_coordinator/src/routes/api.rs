//! HTTP route handlers for the backup coordinator API

use actix_web::{web, HttpRequest, HttpResponse, Responder, Result as ActixResult};
use chrono::Utc;
use prometheus::Encoder;
use serde_json::json;
use tracing::{info, warn};

use crate::models::error::CoordinatorError;
use crate::models::types::{BackupArtifact, Claims, RestoreRequest, ScheduleRequest};
use crate::services::coordinator::Coordinator;
use crate::utils::metrics::get_metrics;

pub struct AppState {
    pub coordinator: Coordinator,
    pub metrics_enabled: bool,
}

/// Registers every route of the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/schedule", web::post().to(set_schedule))
        .route("/schedule", web::get().to(get_schedule))
        .route("/backups", web::get().to(list_backups))
        .route("/backup", web::post().to(create_backup))
        .route("/restore", web::post().to(restore_backup))
        .route("/api-docs/openapi.json", web::get().to(openapi_json))
        .route("/api-docs", web::get().to(scalar_docs));
}

// Helper function to check auth
fn authorize(req: &HttpRequest, data: &AppState) -> Result<Claims, CoordinatorError> {
    data.coordinator.auth.authorize(req).map_err(|e| {
        get_metrics().record_error(e.kind());
        warn!(path = %req.path(), error = %e, "Request rejected");
        e
    })
}

fn text(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(body)
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now()
    })))
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "metrics",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain"),
        (status = 404, description = "Metrics disabled")
    )
)]
pub async fn metrics_handler(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    if !data.metrics_enabled {
        return Ok(HttpResponse::NotFound().json(json!({
            "error": "Metrics are disabled"
        })));
    }

    get_metrics();
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return Ok(HttpResponse::InternalServerError().json(json!({
            "error": format!("Failed to encode metrics: {}", e)
        })));
    }

    Ok(HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer))
}

#[utoipa::path(
    post,
    path = "/schedule",
    tag = "schedule",
    request_body = ScheduleRequest,
    responses(
        (status = 200, description = "Schedule replaced", content_type = "text/plain"),
        (status = 400, description = "Invalid interval"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not allowed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_schedule(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: Option<web::Json<ScheduleRequest>>,
) -> ActixResult<HttpResponse> {
    let claims = authorize(&req, &data)?;

    let requested = body
        .map(|b| b.into_inner().interval)
        .ok_or_else(|| CoordinatorError::InvalidSchedule(String::new()))?;
    let interval = data.coordinator.schedule.set_schedule(&requested).await?;

    info!(interval = %interval, role = %claims.role, "Backup schedule updated");
    Ok(text(format!("Backup schedule set to {}", interval)))
}

#[utoipa::path(
    get,
    path = "/schedule",
    tag = "schedule",
    responses(
        (status = 200, description = "Current schedule, interval is null when idle"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not allowed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_schedule(req: HttpRequest, data: web::Data<AppState>) -> ActixResult<HttpResponse> {
    authorize(&req, &data)?;

    match data.coordinator.schedule.status().await {
        Some(status) => Ok(HttpResponse::Ok().json(status)),
        None => Ok(HttpResponse::Ok().json(json!({
            "interval": null
        }))),
    }
}

#[utoipa::path(
    get,
    path = "/backups",
    tag = "backups",
    responses(
        (status = 200, description = "Archives in the remote store", body = [BackupArtifact]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not allowed"),
        (status = 500, description = "Remote listing failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_backups(req: HttpRequest, data: web::Data<AppState>) -> ActixResult<HttpResponse> {
    authorize(&req, &data)?;

    let backups = data.coordinator.catalog.list_backups().await?;
    Ok(HttpResponse::Ok().json(backups))
}

#[utoipa::path(
    post,
    path = "/backup",
    tag = "backups",
    responses(
        (status = 200, description = "Backup created and uploaded", content_type = "text/plain"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not allowed"),
        (status = 500, description = "Dump or upload failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_backup(req: HttpRequest, data: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let claims = authorize(&req, &data)?;
    info!(role = %claims.role, "Manual backup requested");

    let name = data.coordinator.dump.create_backup().await?;
    Ok(text(format!("Backup created: {}", name)))
}

#[utoipa::path(
    post,
    path = "/restore",
    tag = "backups",
    request_body = RestoreRequest,
    responses(
        (status = 200, description = "Database restored", content_type = "text/plain"),
        (status = 400, description = "Missing or malformed backup name"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not allowed"),
        (status = 500, description = "Download or restore failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn restore_backup(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: Option<web::Json<RestoreRequest>>,
) -> ActixResult<HttpResponse> {
    let claims = authorize(&req, &data)?;

    let name = body.map(|b| b.into_inner().backup_name).ok_or_else(|| {
        CoordinatorError::InvalidArtifactName("request body must include backupName".to_string())
    })?;
    info!(backup = %name, role = %claims.role, "Restore requested");

    data.coordinator.restore.restore_backup(&name).await?;
    Ok(text(format!("Database restored from: {}", name)))
}

#[utoipa::path(
    get,
    path = "/api-docs/openapi.json",
    tag = "docs",
    responses(
        (status = 200, description = "OpenAPI specification", content_type = "application/json")
    )
)]
pub async fn openapi_json() -> ActixResult<impl Responder> {
    use utoipa::OpenApi;
    Ok(HttpResponse::Ok().json(crate::libs::openapi::ApiDoc::openapi()))
}

#[utoipa::path(
    get,
    path = "/api-docs",
    tag = "docs",
    responses(
        (status = 200, description = "Scalar API documentation UI", content_type = "text/html")
    )
)]
pub async fn scalar_docs() -> ActixResult<impl Responder> {
    Ok(crate::libs::scalar::scalar_ui())
}
