use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use async_trait::async_trait;
use backup_coordinator::config::{
    AuthConfig, Config, DatabaseConfig, StagingConfig, StorageBackend, StorageConfig,
};
use backup_coordinator::models::types::Claims;
use backup_coordinator::routes::api::{self, AppState};
use backup_coordinator::services::command::{CommandOutput, CommandRunner, CommandSpec};
use backup_coordinator::services::naming::FixedClock;
use backup_coordinator::stores::memory::MemoryObjectStore;
use backup_coordinator::{CommandError, Coordinator};
use chrono::{TimeZone, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// base64 of "coordinator-test-secret"
const SECRET: &str = "Y29vcmRpbmF0b3ItdGVzdC1zZWNyZXQ=";

/// Pretends to be the dump and restore binaries.
#[derive(Default)]
struct StubRunner {
    calls: Mutex<Vec<CommandSpec>>,
}

impl StubRunner {
    fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|spec| spec.program.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());
        if spec.program == "mongodump" {
            if let Some(archive) = spec.flag_value("archive") {
                std::fs::write(archive, b"archive bytes").unwrap();
            }
        }
        Ok(CommandOutput {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

struct Harness {
    state: web::Data<AppState>,
    store: Arc<MemoryObjectStore>,
    runner: Arc<StubRunner>,
    staging: TempDir,
}

async fn harness() -> Harness {
    let staging = tempfile::tempdir().unwrap();
    let config = Config {
        database: DatabaseConfig {
            uri: Some(SecretString::new("mongodb://db:27017/app".into())),
            ..Default::default()
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        },
        staging: StagingConfig {
            dir: staging.path().to_path_buf(),
            keep_local_copies: true,
        },
        auth: AuthConfig {
            jwt_secret: Some(SecretString::new(SECRET.into())),
        },
        ..Default::default()
    };

    let store = Arc::new(MemoryObjectStore::new());
    let runner = Arc::new(StubRunner::default());
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

    let coordinator = Coordinator::initialize_with_clock(
        &config,
        store.clone(),
        runner.clone(),
        Arc::new(clock),
    )
    .await
    .unwrap();

    Harness {
        state: web::Data::new(AppState {
            coordinator,
            metrics_enabled: true,
        }),
        store,
        runner,
        staging,
    }
}

fn token(role: &str) -> String {
    let claims = Claims {
        sub: Some("ops".into()),
        role: role.into(),
        exp: (Utc::now().timestamp() + 600) as u64,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_base64_secret(SECRET).unwrap(),
    )
    .unwrap()
}

fn bearer(role: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token(role)))
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

macro_rules! service {
    ($harness:expr) => {
        test::init_service(
            App::new()
                .app_data($harness.state.clone())
                .configure(api::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn health_needs_no_token() {
    let h = harness().await;
    let app = service!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn manual_backup_uploads_one_archive() {
    let h = harness().await;
    let app = service!(h);

    let req = test::TestRequest::post()
        .uri("/backup")
        .insert_header(bearer("ADMIN"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    assert_eq!(body, "Backup created: backup_2024-01-01_00-00-00.gz");
    assert_eq!(
        h.store.uploads().await,
        vec!["backup_2024-01-01_00-00-00.gz".to_string()]
    );
    assert_eq!(h.runner.programs(), vec!["mongodump".to_string()]);
    assert!(h.store.contains("backup_2024-01-01_00-00-00.gz").await);
}

#[actix_web::test]
async fn restore_of_missing_backup_fails_without_running_restore() {
    let h = harness().await;
    let app = service!(h);

    let req = test::TestRequest::post()
        .uri("/restore")
        .insert_header(bearer("SYSADMIN"))
        .set_json(json!({"backupName": "x.gz"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("x.gz"));
    assert!(h.runner.programs().is_empty());
    assert!(dir_is_empty(h.staging.path()));
}

#[actix_web::test]
async fn restore_of_existing_backup_runs_restore_and_cleans_up() {
    let h = harness().await;
    h.store
        .insert("backup_2024-01-01_00-00-00.gz", b"archive bytes".to_vec())
        .await;
    let app = service!(h);

    let req = test::TestRequest::post()
        .uri("/restore")
        .insert_header(bearer("ADMIN"))
        .set_json(json!({"backupName": "backup_2024-01-01_00-00-00.gz"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    assert_eq!(body, "Database restored from: backup_2024-01-01_00-00-00.gz");
    assert_eq!(h.runner.programs(), vec!["mongorestore".to_string()]);
    assert!(dir_is_empty(h.staging.path()));
}

#[actix_web::test]
async fn restore_rejects_path_like_names() {
    let h = harness().await;
    let app = service!(h);

    let req = test::TestRequest::post()
        .uri("/restore")
        .insert_header(bearer("ADMIN"))
        .set_json(json!({"backupName": "../etc/passwd"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.runner.programs().is_empty());
}

#[actix_web::test]
async fn user_role_is_forbidden_everywhere() {
    let h = harness().await;
    let app = service!(h);

    let requests = vec![
        test::TestRequest::post()
            .uri("/schedule")
            .set_json(json!({"interval": "daily"})),
        test::TestRequest::get().uri("/schedule"),
        test::TestRequest::get().uri("/backups"),
        test::TestRequest::post().uri("/backup"),
        test::TestRequest::post()
            .uri("/restore")
            .set_json(json!({"backupName": "backup_2024-01-01_00-00-00.gz"})),
    ];

    for req in requests {
        let resp = test::call_service(&app, req.insert_header(bearer("USER")).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    assert!(h.runner.programs().is_empty());
    assert!(h.store.uploads().await.is_empty());
    assert!(h.state.coordinator.schedule.status().await.is_none());
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let h = harness().await;
    let app = service!(h);

    let requests = vec![
        test::TestRequest::post()
            .uri("/schedule")
            .set_json(json!({"interval": "daily"})),
        test::TestRequest::get().uri("/backups"),
        test::TestRequest::post().uri("/backup"),
        test::TestRequest::post()
            .uri("/restore")
            .set_json(json!({"backupName": "x.gz"})),
    ];

    for req in requests {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    let req = test::TestRequest::post()
        .uri("/backup")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert!(h.runner.programs().is_empty());
}

#[actix_web::test]
async fn schedule_is_set_and_reported() {
    let h = harness().await;
    let app = service!(h);

    let req = test::TestRequest::post()
        .uri("/schedule")
        .insert_header(bearer("ADMIN"))
        .set_json(json!({"interval": "weekly"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await, "Backup schedule set to weekly");

    let req = test::TestRequest::get()
        .uri("/schedule")
        .insert_header(bearer("ADMIN"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["interval"], "weekly");
    assert_eq!(body["cron"], "0 0 * * 0");
    assert_eq!(body["next_run"], "2024-01-07T00:00:00Z");

    h.state.coordinator.schedule.stop().await;
}

#[actix_web::test]
async fn invalid_interval_is_a_bad_request() {
    let h = harness().await;
    let app = service!(h);

    let req = test::TestRequest::post()
        .uri("/schedule")
        .insert_header(bearer("ADMIN"))
        .set_json(json!({"interval": "hourly"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("hourly"));
    assert!(h.state.coordinator.schedule.status().await.is_none());
}

#[actix_web::test]
async fn idle_schedule_reports_null_interval() {
    let h = harness().await;
    let app = service!(h);

    let req = test::TestRequest::get()
        .uri("/schedule")
        .insert_header(bearer("SYSADMIN"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"interval": null}));
}

#[actix_web::test]
async fn listing_returns_only_archives() {
    let h = harness().await;
    h.store
        .insert("backup_2024-01-01_00-00-00.gz", vec![0; 12])
        .await;
    h.store.insert("readme.txt", vec![0; 3]).await;
    let app = service!(h);

    let req = test::TestRequest::get()
        .uri("/backups")
        .insert_header(bearer("ADMIN"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "backup_2024-01-01_00-00-00.gz");
    assert_eq!(entries[0]["size"], 12);
}

#[actix_web::test]
async fn openapi_document_is_served() {
    let h = harness().await;
    let app = service!(h);

    let req = test::TestRequest::get()
        .uri("/api-docs/openapi.json")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["paths"]["/restore"].is_object());
}
