// ABOUTME: Integration tests for the hub HTTP API and server lifecycle.
// ABOUTME: Serves the real router on an ephemeral port and drives it with reqwest.

use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use modhub_core::{AggregationService, HubConfig, ManifestStore, ProcessSupervisor};
use modhub_proto::client::HubServiceClient;
use modhub_proto::RegisterRequest;
use modhub_serve::api::build_router;
use modhub_serve::ServeConfig;
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Find a free port on localhost
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn write_manifest(modules: &Path, id: &str) {
    let dir = modules.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("manifest.json"),
        format!(r#"{{"id": "{id}", "name": "Test", "grpc_addr": "127.0.0.1:1"}}"#),
    )
    .unwrap();
}

/// Start the API on a random port over `modules`, return the base URL
async fn start_api(modules: &Path) -> String {
    let config = HubConfig::default();
    let store = Arc::new(ManifestStore::new());
    store.scan(modules).unwrap();
    let service = Arc::new(AggregationService::new(
        store,
        Arc::new(ProcessSupervisor::new(&config)),
        modules.to_path_buf(),
        config.grpc_addr.clone(),
        config.aggregation.clone(),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = build_router(service);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

#[tokio::test]
async fn test_list_modules() {
    let modules = TempDir::new().unwrap();
    write_manifest(modules.path(), "com.test.a");
    let base = start_api(modules.path()).await;

    let resp = reqwest::get(format!("{base}/api/modules")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["access-control-allow-origin"].to_str().unwrap(),
        "*"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "com.test.a");
}

#[tokio::test]
async fn test_summary_for_stopped_module() {
    let modules = TempDir::new().unwrap();
    write_manifest(modules.path(), "com.test.a");
    let base = start_api(modules.path()).await;

    let body: Value = reqwest::get(format!("{base}/api/summary"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body[0]["manifest"]["id"], "com.test.a");
    assert_eq!(body[0]["running"], false);
    assert!(body[0].get("error").is_none());
}

#[tokio::test]
async fn test_scan_picks_up_new_modules() {
    let modules = TempDir::new().unwrap();
    let base = start_api(modules.path()).await;
    write_manifest(modules.path(), "com.test.late");

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/api/scan"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body[0]["id"], "com.test.late");
}

#[tokio::test]
async fn test_scan_failure_is_500() {
    let root = TempDir::new().unwrap();
    let modules = root.path().join("modules");
    std::fs::create_dir_all(&modules).unwrap();
    let base = start_api(&modules).await;
    std::fs::remove_dir_all(&modules).unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/scan"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_module_is_404() {
    let modules = TempDir::new().unwrap();
    let base = start_api(modules.path()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/modules/does-not-exist/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_unknown_action_is_404() {
    let modules = TempDir::new().unwrap();
    write_manifest(modules.path(), "com.test.a");
    let base = start_api(modules.path()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/modules/com.test.a/restart"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_failure_is_400() {
    let modules = TempDir::new().unwrap();
    // No executable mapping, so start fails with a configuration error.
    write_manifest(modules.path(), "com.test.a");
    let base = start_api(modules.path()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/modules/com.test.a/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("executable"));
}

#[tokio::test]
async fn test_stop_idle_module_is_ok() {
    let modules = TempDir::new().unwrap();
    write_manifest(modules.path(), "com.test.a");
    let base = start_api(modules.path()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/modules/com.test.a/stop"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_wrong_method_and_unknown_route() {
    let modules = TempDir::new().unwrap();
    let base = start_api(modules.path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/modules"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = client.get(format!("{base}/api/scan")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = client.get(format!("{base}/api/nope")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_preflight() {
    let modules = TempDir::new().unwrap();
    let base = start_api(modules.path()).await;

    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{base}/api/modules/x/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        resp.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap(),
        "GET, POST, OPTIONS"
    );
    assert_eq!(
        resp.headers()["access-control-allow-headers"]
            .to_str()
            .unwrap(),
        "Content-Type"
    );
}

#[tokio::test]
async fn test_upload_module() {
    let modules = TempDir::new().unwrap();
    let base = start_api(modules.path()).await;

    // Browsers send relative paths as field names verbatim.
    let form = reqwest::multipart::Form::new()
        .percent_encode_noop()
        .part(
            "manifest.json",
            reqwest::multipart::Part::bytes(
                br#"{"id": "com.test.up", "name": "Uploaded", "grpc_addr": "127.0.0.1:1"}"#
                    .to_vec(),
            )
            .file_name("manifest.json"),
        )
        .part(
            "assets/readme.txt",
            reqwest::multipart::Part::bytes(b"hello".to_vec()).file_name("readme.txt"),
        )
        .part(
            "../escape.txt",
            reqwest::multipart::Part::bytes(b"bad".to_vec()).file_name("escape.txt"),
        );

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/modules/add"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], "true");
    assert_eq!(body["module_id"], "com.test.up");

    assert_eq!(
        std::fs::read_to_string(modules.path().join("com.test.up/assets/readme.txt")).unwrap(),
        "hello"
    );
    assert!(!modules.path().join("escape.txt").exists());

    let listed: Value = reqwest::get(format!("{base}/api/modules"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed[0]["id"], "com.test.up");
}

#[tokio::test]
async fn test_upload_without_manifest_is_400() {
    let modules = TempDir::new().unwrap();
    let base = start_api(modules.path()).await;

    let form = reqwest::multipart::Form::new().part(
        "notes.txt",
        reqwest::multipart::Part::bytes(b"x".to_vec()).file_name("notes.txt"),
    );
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/modules/add"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "manifest.json is required");
}

#[tokio::test]
async fn test_server_serves_both_protocols_and_shuts_down() {
    let modules = TempDir::new().unwrap();
    write_manifest(modules.path(), "com.test.a");

    let mut hub = HubConfig::default();
    hub.http_addr = format!("127.0.0.1:{}", free_port());
    hub.grpc_addr = format!("127.0.0.1:{}", free_port());
    let config = ServeConfig {
        hub: hub.clone(),
        modules_dir: modules.path().to_path_buf(),
    };

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(modhub_serve::server::run_until(config, shutdown.clone()));

    let base = format!("http://{}", hub.http_addr);
    let mut listed = None;
    for _ in 0..50 {
        if let Ok(resp) = reqwest::get(format!("{base}/api/modules")).await {
            listed = Some(resp.json::<Value>().await.unwrap());
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(listed.unwrap()[0]["id"], "com.test.a");

    let mut client = None;
    for _ in 0..50 {
        if let Ok(c) = HubServiceClient::connect(format!("http://{}", hub.grpc_addr)).await {
            client = Some(c);
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let response = client
        .unwrap()
        .register(RegisterRequest {
            module_id: "com.test.a".to_string(),
            version: "1.0.0".to_string(),
            pid: 1,
        })
        .await
        .unwrap()
        .into_inner();
    assert!(response.success);
    assert_eq!(response.hub_id, "hub");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
