// ABOUTME: Query and command surface over the manifest store and process supervisor.
// ABOUTME: Builds per-module status summaries by calling running modules with bounded timeouts.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::config::AggregationConfig;
use crate::install::{install_module, InstallError, UploadedFile};
use crate::manifest::{ManifestStore, ModuleManifest, ScanError};
use crate::rpc::{ModuleClient, RpcError};
use crate::supervisor::{LaunchOptions, ProcessSupervisor, StartOutcome, SupervisorError};

/// Status of one module as shown on the dashboard. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub manifest: ModuleManifest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub running: bool,
}

/// Lifecycle actions accepted for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    /// Start headless and connect automatically.
    Start,
    /// Restart with the module's own UI shown.
    OpenUi,
    Stop,
}

impl FromStr for LifecycleCommand {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "open-ui" => Ok(Self::OpenUi),
            "stop" => Ok(Self::Stop),
            other => Err(HubError::UnknownCommand(other.to_string())),
        }
    }
}

impl std::fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::OpenUi => "open-ui",
            Self::Stop => "stop",
        })
    }
}

#[derive(Error, Debug)]
pub enum HubError {
    #[error("module not found: {0}")]
    UnknownModule(String),

    #[error("unknown action: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Install(#[from] InstallError),
}

/// What the RPC stage learned about a running module's widget.
#[derive(Debug, Default)]
struct WidgetQuery {
    widget_type: Option<String>,
    payload_url: Option<String>,
}

pub struct AggregationService {
    store: Arc<ManifestStore>,
    supervisor: Arc<ProcessSupervisor>,
    modules_dir: PathBuf,
    hub_addr: String,
    config: AggregationConfig,
    http: reqwest::Client,
}

impl AggregationService {
    pub fn new(
        store: Arc<ManifestStore>,
        supervisor: Arc<ProcessSupervisor>,
        modules_dir: PathBuf,
        hub_addr: String,
        config: AggregationConfig,
    ) -> Self {
        // The payload stage is also bounded by its own tokio timeout, so the
        // fallback client never leaves a summary unbounded.
        let http = match reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build payload HTTP client, using defaults");
                reqwest::Client::new()
            }
        };
        Self {
            store,
            supervisor,
            modules_dir,
            hub_addr,
            config,
            http,
        }
    }

    pub fn store(&self) -> &Arc<ManifestStore> {
        &self.store
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn modules_dir(&self) -> &PathBuf {
        &self.modules_dir
    }

    pub fn list(&self) -> Vec<ModuleManifest> {
        self.store.list()
    }

    /// Rescan the modules directory and return the resulting manifest list.
    pub async fn scan(&self) -> Result<Vec<ModuleManifest>, HubError> {
        let store = Arc::clone(&self.store);
        let dir = self.modules_dir.clone();
        tokio::task::spawn_blocking(move || store.scan(&dir))
            .await
            .map_err(|e| ScanError {
                path: self.modules_dir.clone(),
                source: std::io::Error::other(e),
            })??;
        Ok(self.store.list())
    }

    /// Install an uploaded module and rescan. A failed rescan is logged, not returned.
    pub async fn install(&self, files: Vec<UploadedFile>) -> Result<String, HubError> {
        let id = install_module(&self.modules_dir, files).await?;
        if let Err(e) = self.scan().await {
            tracing::warn!(module = %id, error = %e, "Rescan after install failed");
        }
        Ok(id)
    }

    /// Summaries for every known module, ordered by ID.
    ///
    /// Running modules are queried concurrently, each under its own timeout, so
    /// one hung module costs at most that timeout and never fails the batch.
    pub async fn summary(&self) -> Vec<ModuleSummary> {
        let manifests = self.store.list();
        stream::iter(manifests)
            .map(|manifest| self.summarize(manifest))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    async fn summarize(&self, manifest: ModuleManifest) -> ModuleSummary {
        let running = self.supervisor.is_running(&manifest.id).await;
        let mut summary = ModuleSummary {
            manifest,
            widget_type: None,
            payload: None,
            error: None,
            running,
        };
        if !running {
            return summary;
        }

        let timeout = self.config.rpc_timeout();
        let queried =
            tokio::time::timeout(timeout, self.query_widget(&summary.manifest.grpc_addr))
                .await
                .unwrap_or(Err(RpcError::Timeout(timeout)));

        let query = match queried {
            Ok(query) => query,
            Err(e) => {
                tracing::debug!(module = %summary.manifest.id, error = %e, "Widget fetch failed");
                summary.error = Some(e.to_string());
                return summary;
            }
        };
        summary.widget_type = query.widget_type;

        // The payload has its own budget and never turns into an error.
        if let Some(url) = query.payload_url {
            let timeout = self.config.http_timeout();
            summary.payload = tokio::time::timeout(timeout, self.fetch_payload(&url))
                .await
                .unwrap_or_else(|_| {
                    tracing::debug!(module = %summary.manifest.id, url = %url, "Payload fetch timed out");
                    None
                });
        }
        summary
    }

    /// RPC stage of a summary: the first widget and, when it has a data
    /// endpoint, the URL its payload is served from.
    async fn query_widget(&self, address: &str) -> Result<WidgetQuery, RpcError> {
        let mut client = ModuleClient::connect(address, self.config.rpc_timeout()).await?;
        let widgets = client.widgets().await?;
        let Some(widget) = widgets.into_iter().next() else {
            return Ok(WidgetQuery::default());
        };

        let widget_type = if widget.id.is_empty() {
            widget.title.clone()
        } else {
            widget.id.clone()
        };
        let mut query = WidgetQuery {
            widget_type: Some(widget_type).filter(|t| !t.is_empty()),
            payload_url: None,
        };

        if widget.data_endpoint.is_empty() {
            return Ok(query);
        }
        match client.info().await {
            Ok(info) if !info.ui_url.is_empty() => {
                query.payload_url = Some(format!("{}{}", info.ui_url, widget.data_endpoint));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(address, error = %e, "GetInfo failed, skipping payload");
            }
        }
        Ok(query)
    }

    async fn fetch_payload(&self, url: &str) -> Option<serde_json::Value> {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "Payload fetch failed");
                return None;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!(url, status = %response.status(), "Payload fetch returned non-200");
            return None;
        }
        match response.json::<serde_json::Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(url, error = %e, "Payload is not JSON");
                None
            }
        }
    }

    /// Run a lifecycle command against a known module.
    pub async fn execute(&self, id: &str, command: LifecycleCommand) -> Result<(), HubError> {
        let manifest = self
            .store
            .get(id)
            .ok_or_else(|| HubError::UnknownModule(id.to_string()))?;

        tracing::info!(module = %id, %command, "Lifecycle command");
        match command {
            LifecycleCommand::Start => {
                self.start(&manifest, false, true).await?;
            }
            LifecycleCommand::OpenUi => {
                if let Err(e) = self.supervisor.stop(&manifest).await {
                    tracing::debug!(module = %id, error = %e, "Stop before open-ui failed");
                }
                self.start(&manifest, true, false).await?;
            }
            LifecycleCommand::Stop => self.supervisor.stop(&manifest).await?,
        }
        Ok(())
    }

    /// Parse `action` and run it; an unknown module is reported before an unknown action.
    pub async fn execute_action(&self, id: &str, action: &str) -> Result<(), HubError> {
        if self.store.get(id).is_none() {
            return Err(HubError::UnknownModule(id.to_string()));
        }
        let command = action.parse::<LifecycleCommand>()?;
        self.execute(id, command).await
    }

    async fn start(
        &self,
        manifest: &ModuleManifest,
        show_ui: bool,
        auto_connect: bool,
    ) -> Result<StartOutcome, SupervisorError> {
        let options = LaunchOptions {
            modules_dir: self.modules_dir.clone(),
            hub_addr: self.hub_addr.clone(),
            show_ui,
            auto_connect,
        };
        self.supervisor.start(manifest, &options).await
    }
}
