//! OpenAPI specification and documentation

use utoipa::OpenApi;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify,
};

use crate::models::types::{
    BackupArtifact, RestoreRequest, ScheduleInterval, ScheduleRequest, ScheduleStatus,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::api::health_check,
        crate::routes::api::metrics_handler,
        crate::routes::api::set_schedule,
        crate::routes::api::get_schedule,
        crate::routes::api::list_backups,
        crate::routes::api::create_backup,
        crate::routes::api::restore_backup,
        crate::routes::api::openapi_json,
        crate::routes::api::scalar_docs,
    ),
    components(schemas(
        BackupArtifact,
        RestoreRequest,
        ScheduleInterval,
        ScheduleRequest,
        ScheduleStatus,
    )),
    tags(
        (name = "health", description = "Liveness check"),
        (name = "metrics", description = "Prometheus metrics"),
        (name = "schedule", description = "Recurring backup schedule"),
        (name = "backups", description = "Create, list and restore backups"),
        (name = "docs", description = "API documentation"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_protected_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/schedule", "/backups", "/backup", "/restore", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
