//! ---
//! refdata_section: "15-testing-qa-runbook"
//! refdata_subsection: "integration-tests"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Configuration, storage and metrics wiring as assembled by the daemon."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use refdata_api::{bootstrap_admin, spawn_api_server, ApiState};
use refdata_common::config::AppConfig;
use refdata_metrics::{new_registry, spawn_http_server, DaemonMetrics};
use refdata_persistence::Database;
use refdata_rights::RightsMetrics;
use refdata_security::SecurityMetrics;
use reqwest::StatusCode;
use tempfile::tempdir;

fn config_for(dir: &std::path::Path) -> AppConfig {
    let document = format!(
        r#"
[database]
path = "{db}"
max_connections = 2

[api]
listen = "127.0.0.1:0"
default_page_size = 50

[logging]
directory = "{logs}"
format = "pretty"

[right_assignments]
generate_on_startup = true

[auth]
token_ttl = 3600
"#,
        db = dir.join("data/refdata.db").display(),
        logs = dir.join("logs").display(),
    );
    document.parse().unwrap()
}

#[tokio::test]
async fn file_backed_store_survives_restart() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path());
    assert_eq!(config.api.default_page_size, 50);
    assert_eq!(config.auth.token_ttl.unwrap().as_secs(), 3600);

    let db = Database::connect(&config.database).await.unwrap();
    let state = ApiState::new(db.clone(), &config);
    let token = bootstrap_admin(&state, "administrator").await.unwrap();
    assert!(token.expires_at.is_some());
    db.close().await;

    let db = Database::connect(&config.database).await.unwrap();
    let state = ApiState::new(db.clone(), &config);
    let principal = state
        .tokens()
        .authenticate(&token.access_token)
        .await
        .unwrap();
    assert_eq!(principal.username, "administrator");
    assert_eq!(
        state.repositories().right_assignments.count().await.unwrap(),
        11
    );

    // Bootstrapping again keeps a single user and assignment set.
    let again = bootstrap_admin(&state, "administrator").await.unwrap();
    assert_eq!(again.user_id, token.user_id);
    assert_eq!(
        state.repositories().right_assignments.count().await.unwrap(),
        11
    );
    db.close().await;
}

#[tokio::test]
async fn metrics_exporter_reports_auth_and_generation() {
    let registry = new_registry();
    let daemon = DaemonMetrics::new(registry.clone()).unwrap();
    daemon.inc_start();

    let db = Database::in_memory().await.unwrap();
    let state = ApiState::new(db, &AppConfig::default())
        .with_security_metrics(SecurityMetrics::new(registry.clone()).unwrap())
        .with_rights_metrics(RightsMetrics::new(registry.clone()).unwrap());
    let state = Arc::new(state);
    bootstrap_admin(&state, "administrator").await.unwrap();

    let api = spawn_api_server(state, "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let response = reqwest::Client::new()
        .get(format!("http://{}/api/programs", api.addr()))
        .bearer_auth("forged")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let exporter = spawn_http_server(registry, "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let body = reqwest::get(format!("http://{}/metrics", exporter.addr()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("refdatad_starts_total 1"));
    assert!(body.contains("refdata_auth_failures_total 1"));
    assert!(body.contains("refdata_right_assignment_runs_total{scope=\"user\"} 1"));
    assert!(body.contains("refdata_right_assignment_rows_written_total 11"));

    exporter.shutdown().await.unwrap();
    api.shutdown().await.unwrap();
}
