// ABOUTME: End-to-end tests for status aggregation against real module processes.
// ABOUTME: Uses shell-script modules, an in-process gRPC module server, and an HTTP status endpoint.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use modhub_core::platform::platform_key;
use modhub_core::{AggregationService, HubConfig, LifecycleCommand, ManifestStore, ProcessSupervisor};
use modhub_proto::server::{ModuleService, ModuleServiceServer};
use modhub_proto::{Empty, ExecuteRequest, ExecuteResponse, ModuleInfo, Widget, WidgetList};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

#[derive(Default)]
struct FakeModule {
    ui_url: String,
    data_endpoint: String,
    widgets_delay: Duration,
}

#[tonic::async_trait]
impl ModuleService for FakeModule {
    async fn get_widgets(&self, _request: Request<Empty>) -> Result<Response<WidgetList>, Status> {
        tokio::time::sleep(self.widgets_delay).await;
        Ok(Response::new(WidgetList {
            widgets: vec![Widget {
                id: "net-status".to_string(),
                title: "Network".to_string(),
                data_endpoint: self.data_endpoint.clone(),
            }],
        }))
    }

    async fn get_info(&self, _request: Request<Empty>) -> Result<Response<ModuleInfo>, Status> {
        Ok(Response::new(ModuleInfo {
            id: "com.test.net".to_string(),
            name: "Net".to_string(),
            version: "1.0.0".to_string(),
            ui_url: self.ui_url.clone(),
        }))
    }

    async fn execute(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<ExecuteResponse>, Status> {
        let action = request.into_inner().action_id;
        Ok(Response::new(ExecuteResponse {
            success: action == "disconnect",
            error: String::new(),
        }))
    }
}

/// Serve a fake module's gRPC API on an ephemeral port and return its address.
async fn serve_module(module: FakeModule) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(ModuleServiceServer::new(module))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

/// Serve the module's HTTP UI with a JSON status endpoint, a non-JSON one, and
/// one that never answers.
async fn serve_status() -> String {
    let app = Router::new()
        .route(
            "/api/status",
            get(|| async { Json(serde_json::json!({"connected": true, "peers": 3})) }),
        )
        .route("/api/text", get(|| async { "not json" }))
        .route("/api/hang", get(std::future::pending::<&'static str>));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    url
}

fn install_module(modules: &Path, id: &str, grpc_addr: &str) {
    let dir = modules.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    let exe = dir.join("module.sh");
    std::fs::write(&exe, "#!/bin/sh\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut executable = BTreeMap::new();
    executable.insert(platform_key().to_string(), "module.sh".to_string());
    let manifest = serde_json::json!({
        "id": id,
        "name": id,
        "version": "1.0.0",
        "grpc_addr": grpc_addr,
        "executable": executable,
    });
    std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
}

fn hub(modules: &Path) -> AggregationService {
    let mut config = HubConfig::default();
    config.supervisor.readiness_timeout_ms = 2000;
    config.supervisor.readiness_poll_ms = 25;
    config.supervisor.stop_grace_ms = 100;
    config.supervisor.disconnect_timeout_ms = 300;
    config.aggregation.rpc_timeout_ms = 700;
    config.aggregation.http_timeout_ms = 500;

    AggregationService::new(
        Arc::new(ManifestStore::new()),
        Arc::new(ProcessSupervisor::new(&config)),
        modules.to_path_buf(),
        config.grpc_addr.clone(),
        config.aggregation.clone(),
    )
}

#[tokio::test]
async fn test_summary_includes_widget_payload() {
    let root = TempDir::new().unwrap();
    let ui_url = serve_status().await;
    let addr = serve_module(FakeModule {
        ui_url,
        data_endpoint: "/api/status".to_string(),
        ..Default::default()
    })
    .await;
    install_module(root.path(), "com.test.net", &addr);

    let hub = hub(root.path());
    hub.scan().await.unwrap();
    hub.execute("com.test.net", LifecycleCommand::Start)
        .await
        .unwrap();

    let summaries = hub.summary().await;
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.manifest.id, "com.test.net");
    assert!(summary.running);
    assert_eq!(summary.error, None);
    assert_eq!(summary.widget_type.as_deref(), Some("net-status"));
    assert_eq!(
        summary.payload,
        Some(serde_json::json!({"connected": true, "peers": 3}))
    );

    hub.execute("com.test.net", LifecycleCommand::Stop)
        .await
        .unwrap();
    assert!(!hub.supervisor().is_running("com.test.net").await);
}

#[tokio::test]
async fn test_non_json_payload_degrades() {
    let root = TempDir::new().unwrap();
    let ui_url = serve_status().await;
    let addr = serve_module(FakeModule {
        ui_url,
        data_endpoint: "/api/text".to_string(),
        ..Default::default()
    })
    .await;
    install_module(root.path(), "com.test.net", &addr);

    let hub = hub(root.path());
    hub.scan().await.unwrap();
    hub.execute("com.test.net", LifecycleCommand::Start)
        .await
        .unwrap();

    let summaries = hub.summary().await;
    assert!(summaries[0].running);
    assert_eq!(summaries[0].widget_type.as_deref(), Some("net-status"));
    assert_eq!(summaries[0].payload, None);
    assert_eq!(summaries[0].error, None);

    hub.supervisor().shutdown().await;
}

#[tokio::test]
async fn test_slow_payload_keeps_widget_type() {
    let root = TempDir::new().unwrap();
    let ui_url = serve_status().await;
    // Most of the RPC budget goes to GetWidgets, then the payload hangs.
    let addr = serve_module(FakeModule {
        ui_url,
        data_endpoint: "/api/hang".to_string(),
        widgets_delay: Duration::from_millis(400),
    })
    .await;
    install_module(root.path(), "com.test.net", &addr);

    let hub = hub(root.path());
    hub.scan().await.unwrap();
    hub.execute("com.test.net", LifecycleCommand::Start)
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let summaries = hub.summary().await;
    // rpc 700ms + http 500ms, with slack
    assert!(started.elapsed() < Duration::from_millis(2000));

    assert!(summaries[0].running);
    assert_eq!(summaries[0].error, None);
    assert_eq!(summaries[0].widget_type.as_deref(), Some("net-status"));
    assert_eq!(summaries[0].payload, None);

    hub.supervisor().shutdown().await;
}

#[tokio::test]
async fn test_silent_modules_are_queried_concurrently() {
    let root = TempDir::new().unwrap();
    let mut listeners = Vec::new();
    for n in 0..4 {
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap().to_string();
        install_module(root.path(), &format!("com.test.silent{n}"), &addr);
        listeners.push(silent);
    }

    let hub = hub(root.path());
    hub.scan().await.unwrap();
    for n in 0..4 {
        hub.execute(&format!("com.test.silent{n}"), LifecycleCommand::Start)
            .await
            .unwrap();
    }

    let started = std::time::Instant::now();
    let summaries = hub.summary().await;
    let elapsed = started.elapsed();

    // One 700ms RPC timeout, not four of them back to back.
    assert!(elapsed < Duration::from_millis(1400), "took {elapsed:?}");
    assert_eq!(summaries.len(), 4);
    for summary in &summaries {
        assert!(summary.running);
        assert!(summary.error.is_some());
    }

    hub.supervisor().shutdown().await;
    drop(listeners);
}

#[tokio::test]
async fn test_unreachable_module_reports_error() {
    let root = TempDir::new().unwrap();
    // Accepts TCP so the module counts as ready, but never speaks gRPC.
    let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_addr = silent.local_addr().unwrap().to_string();
    install_module(root.path(), "com.test.silent", &silent_addr);
    install_module(root.path(), "com.test.idle", "127.0.0.1:1");

    let hub = hub(root.path());
    hub.scan().await.unwrap();
    hub.execute("com.test.silent", LifecycleCommand::Start)
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let summaries = hub.summary().await;
    assert!(started.elapsed() < Duration::from_secs(3));

    let ids: Vec<_> = summaries.iter().map(|s| s.manifest.id.as_str()).collect();
    assert_eq!(ids, vec!["com.test.idle", "com.test.silent"]);

    assert!(!summaries[0].running);
    assert!(summaries[0].error.is_none());

    assert!(summaries[1].running);
    assert!(summaries[1].error.is_some());
    assert!(summaries[1].payload.is_none());

    hub.supervisor().shutdown().await;
    drop(silent);
}

#[tokio::test]
async fn test_killed_module_eventually_not_running() {
    let root = TempDir::new().unwrap();
    let addr = serve_module(FakeModule::default()).await;
    install_module(root.path(), "com.test.net", &addr);

    let hub = hub(root.path());
    hub.scan().await.unwrap();
    hub.execute("com.test.net", LifecycleCommand::Start)
        .await
        .unwrap();
    assert!(hub.summary().await[0].running);

    let pid = hub.supervisor().pid("com.test.net").await.unwrap();
    let status = std::process::Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .status()
        .unwrap();
    assert!(status.success());

    let mut running = true;
    for _ in 0..100 {
        running = hub.summary().await[0].running;
        if !running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!running);
}

#[tokio::test]
async fn test_open_ui_keeps_single_process() {
    let root = TempDir::new().unwrap();
    let addr = serve_module(FakeModule::default()).await;
    install_module(root.path(), "com.test.net", &addr);

    let hub = hub(root.path());
    hub.scan().await.unwrap();
    hub.execute("com.test.net", LifecycleCommand::Start)
        .await
        .unwrap();
    let first = hub.supervisor().pid("com.test.net").await;

    hub.execute("com.test.net", LifecycleCommand::OpenUi)
        .await
        .unwrap();
    let second = hub.supervisor().pid("com.test.net").await;

    assert!(second.is_some());
    assert_ne!(first, second);
    assert_eq!(
        hub.supervisor().running_ids().await,
        vec!["com.test.net".to_string()]
    );

    hub.supervisor().shutdown().await;
}
