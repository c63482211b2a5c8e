// ABOUTME: Starts, tracks, and stops module processes.
// ABOUTME: One handle per module ID; a reaper task retracts the handle when the process exits.

mod env;
mod error;
mod probe;
mod resolve;

pub use env::{build_module_env, EnvPolicy, LaunchFlags};
pub use error::SupervisorError;
pub use probe::wait_for_tcp;
pub use resolve::{executable_name, resolve_data_dir, resolve_executable};

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch, Mutex, RwLock};

use crate::config::HubConfig;
use crate::manifest::ModuleManifest;
use crate::rpc::client::request_disconnect;

/// Upper bound on waiting for a killed process to be reaped.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Where and how a module is launched.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub modules_dir: PathBuf,
    pub hub_addr: String,
    pub show_ui: bool,
    pub auto_connect: bool,
}

/// Result of a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Spawned { pid: Option<u32> },
    AlreadyRunning { pid: Option<u32> },
}

impl StartOutcome {
    pub fn pid(&self) -> Option<u32> {
        match self {
            StartOutcome::Spawned { pid } | StartOutcome::AlreadyRunning { pid } => *pid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Starting,
    Running,
    Stopping,
}

struct ProcessHandle {
    instance: u64,
    pid: Option<u32>,
    state: LifecycleState,
    // Dropping the sender also kills the process.
    kill_tx: mpsc::Sender<()>,
    exited: watch::Receiver<bool>,
}

type HandleTable = Arc<RwLock<HashMap<String, ProcessHandle>>>;

/// Owns every module process the hub launched.
pub struct ProcessSupervisor {
    config: HubConfig,
    handles: HandleTable,
    lifecycle_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_instance: AtomicU64,
}

impl ProcessSupervisor {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            config: config.clone(),
            handles: Arc::new(RwLock::new(HashMap::new())),
            lifecycle_locks: Mutex::new(HashMap::new()),
            next_instance: AtomicU64::new(1),
        }
    }

    /// True once `start` has succeeded and until the process is seen to exit.
    pub async fn is_running(&self, id: &str) -> bool {
        let handles = self.handles.read().await;
        handles.get(id).is_some_and(|handle| {
            matches!(
                handle.state,
                LifecycleState::Running | LifecycleState::Stopping
            ) && !*handle.exited.borrow()
        })
    }

    pub async fn pid(&self, id: &str) -> Option<u32> {
        self.handles.read().await.get(id).and_then(|h| h.pid)
    }

    /// IDs of modules with a live handle, sorted.
    pub async fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Launch a module and wait for its gRPC port to accept connections.
    ///
    /// Starting a module that is already running attaches to the existing
    /// process. Start and stop for the same ID never interleave.
    pub async fn start(
        &self,
        manifest: &ModuleManifest,
        options: &LaunchOptions,
    ) -> Result<StartOutcome, SupervisorError> {
        if manifest.id.is_empty() {
            return Err(SupervisorError::MissingId);
        }
        if manifest.grpc_addr.trim().is_empty() {
            return Err(SupervisorError::MissingRpcAddress(manifest.id.clone()));
        }

        let lock = self.lifecycle_lock(&manifest.id).await;
        let result = {
            let _guard = lock.lock().await;
            self.start_locked(manifest, options).await
        };
        self.release_lifecycle_lock(&manifest.id, lock).await;
        result
    }

    /// Ask a module to disconnect, give it the grace period to exit, then kill it.
    pub async fn stop(&self, manifest: &ModuleManifest) -> Result<(), SupervisorError> {
        if manifest.id.is_empty() {
            return Err(SupervisorError::MissingId);
        }

        let lock = self.lifecycle_lock(&manifest.id).await;
        {
            let _guard = lock.lock().await;
            self.stop_locked(manifest).await;
        }
        self.release_lifecycle_lock(&manifest.id, lock).await;
        Ok(())
    }

    /// Kill every supervised process. Used when the hub exits.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, ProcessHandle)> = self.handles.write().await.drain().collect();
        for (id, handle) in drained {
            tracing::info!(module = %id, pid = ?handle.pid, "Stopping module for hub shutdown");
            let _ = handle.kill_tx.try_send(());
            let exited = handle.exited.clone();
            drop(handle);
            if tokio::time::timeout(KILL_WAIT, wait_exit(exited)).await.is_err() {
                tracing::warn!(module = %id, "Module did not exit after kill");
            }
        }
    }

    async fn start_locked(
        &self,
        manifest: &ModuleManifest,
        options: &LaunchOptions,
    ) -> Result<StartOutcome, SupervisorError> {
        let id = manifest.id.as_str();

        let stale = match self.handles.read().await.get(id) {
            Some(handle) if !*handle.exited.borrow() => {
                if handle.state != LifecycleState::Starting {
                    tracing::debug!(module = %id, pid = ?handle.pid, "Module already running");
                    return Ok(StartOutcome::AlreadyRunning { pid: handle.pid });
                }
                // Holding the lifecycle lock, so the start that left this behind is gone.
                Some((handle.pid, handle.kill_tx.clone(), handle.exited.clone()))
            }
            _ => None,
        };
        if let Some((pid, kill_tx, exited)) = stale {
            tracing::warn!(
                module = %id,
                pid = ?pid,
                "Replacing module left behind by an abandoned start"
            );
            let _ = kill_tx.try_send(());
            if tokio::time::timeout(KILL_WAIT, wait_exit(exited)).await.is_err() {
                tracing::warn!(module = %id, "Abandoned module did not exit after kill");
            }
        }

        let companion = self.config.companion(id);
        let require_release = options.show_ui && self.config.require_release;
        let executable =
            resolve_executable(manifest, &options.modules_dir, companion, require_release)?;

        let data_dir = resolve_data_dir(manifest, &options.modules_dir, companion)?;
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|source| SupervisorError::DataDir {
                path: data_dir.clone(),
                source,
            })?;

        let work_dir = resolve::working_dir(manifest, &options.modules_dir, &executable);
        let policy = EnvPolicy {
            strip_prefixes: &self.config.supervisor.strip_env_prefixes,
            prefix: &self.config.supervisor.env_prefix,
            extra: &self.config.supervisor.extra_env,
        };
        let env = build_module_env(
            std::env::vars_os(),
            &policy,
            &options.hub_addr,
            LaunchFlags {
                show_ui: options.show_ui,
                auto_connect: options.auto_connect,
            },
        );

        let mut cmd = Command::new(&executable);
        cmd.arg("--mode=hub")
            .arg(format!("--hub-addr={}", options.hub_addr))
            .arg(format!("--addr={}", manifest.grpc_addr))
            .arg(format!("--data-dir={}", data_dir.display()))
            .current_dir(&work_dir)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            id: id.to_string(),
            source,
        })?;
        let pid = child.id();
        tracing::info!(
            module = %id,
            pid = ?pid,
            executable = %executable.display(),
            show_ui = options.show_ui,
            "Spawned module"
        );
        forward_output(id, &mut child);

        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        let (kill_tx, kill_rx) = mpsc::channel(1);
        let (exited_tx, exited_rx) = watch::channel(false);

        self.handles.write().await.insert(
            id.to_string(),
            ProcessHandle {
                instance,
                pid,
                state: LifecycleState::Starting,
                kill_tx: kill_tx.clone(),
                exited: exited_rx.clone(),
            },
        );
        tokio::spawn(reap(
            child,
            kill_rx,
            exited_tx,
            Arc::clone(&self.handles),
            id.to_string(),
            instance,
        ));
        // Fires if this future is dropped before the module is ready.
        let mut abort_guard = KillOnAbort {
            kill_tx: kill_tx.clone(),
            armed: true,
        };

        let readiness = self.config.supervisor.readiness_timeout();
        let ready = tokio::select! {
            ready = wait_for_tcp(
                &manifest.grpc_addr,
                readiness,
                self.config.supervisor.readiness_poll(),
                self.config.supervisor.probe_connect_timeout(),
            ) => ready,
            _ = wait_exit(exited_rx.clone()) => {
                tracing::warn!(module = %id, "Module exited during readiness probe");
                return Err(SupervisorError::ExitedEarly(id.to_string()));
            }
        };

        if !ready {
            tracing::warn!(module = %id, addr = %manifest.grpc_addr, "Module not ready, killing");
            let _ = kill_tx.try_send(());
            let _ = tokio::time::timeout(KILL_WAIT, wait_exit(exited_rx)).await;
            return Err(SupervisorError::NotReady {
                id: id.to_string(),
                addr: manifest.grpc_addr.clone(),
                timeout: readiness,
            });
        }

        let mut handles = self.handles.write().await;
        match handles.get_mut(id) {
            Some(handle) if handle.instance == instance => {
                handle.state = LifecycleState::Running;
                abort_guard.armed = false;
                tracing::info!(module = %id, pid = ?pid, "Module ready");
                Ok(StartOutcome::Spawned { pid })
            }
            _ => Err(SupervisorError::ExitedEarly(id.to_string())),
        }
    }

    async fn stop_locked(&self, manifest: &ModuleManifest) {
        let id = manifest.id.as_str();

        let (instance, kill_tx, exited) = {
            let mut handles = self.handles.write().await;
            let Some(handle) = handles.get_mut(id) else {
                tracing::debug!(module = %id, "Stop requested for module that is not running");
                return;
            };
            handle.state = LifecycleState::Stopping;
            (handle.instance, handle.kill_tx.clone(), handle.exited.clone())
        };

        let tuning = &self.config.supervisor;
        if !manifest.grpc_addr.trim().is_empty() {
            if let Err(e) =
                request_disconnect(&manifest.grpc_addr, tuning.disconnect_timeout()).await
            {
                tracing::debug!(module = %id, error = %e, "Disconnect request failed");
            }
        }

        if tokio::time::timeout(tuning.stop_grace(), wait_exit(exited.clone()))
            .await
            .is_ok()
        {
            tracing::info!(module = %id, "Module exited after disconnect");
            return;
        }

        let still_present = self
            .handles
            .read()
            .await
            .get(id)
            .is_some_and(|h| h.instance == instance);
        if !still_present {
            return;
        }

        tracing::info!(module = %id, "Killing module");
        let _ = kill_tx.try_send(());
        if tokio::time::timeout(KILL_WAIT, wait_exit(exited)).await.is_err() {
            tracing::warn!(module = %id, "Module did not exit after kill, dropping handle");
            let mut handles = self.handles.write().await;
            if handles.get(id).is_some_and(|h| h.instance == instance) {
                handles.remove(id);
            }
        }
    }

    async fn lifecycle_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.lifecycle_locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_lifecycle_lock(&self, id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.lifecycle_locks.lock().await;
        if let Some(lock) = locks.get(id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(id);
            }
        }
    }
}

/// Kills a freshly spawned module unless the start that launched it completes.
struct KillOnAbort {
    kill_tx: mpsc::Sender<()>,
    armed: bool,
}

impl Drop for KillOnAbort {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.kill_tx.try_send(());
        }
    }
}

/// Resolves once the reaper has observed the process exit.
async fn wait_exit(mut exited: watch::Receiver<bool>) {
    loop {
        let done = *exited.borrow_and_update();
        if done || exited.changed().await.is_err() {
            return;
        }
    }
}

/// Waits for the child to exit (or kills it on request), then retracts its handle.
async fn reap(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<()>,
    exited_tx: watch::Sender<bool>,
    handles: HandleTable,
    id: String,
    instance: u64,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx.recv() => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(module = %id, error = %e, "Kill failed");
            }
            child.wait().await
        }
    };

    match status {
        Ok(status) => tracing::info!(module = %id, %status, "Module exited"),
        Err(e) => tracing::warn!(module = %id, error = %e, "Failed waiting for module"),
    }

    {
        let mut table = handles.write().await;
        if table.get(&id).is_some_and(|h| h.instance == instance) {
            table.remove(&id);
        }
    }
    let _ = exited_tx.send(true);
}

fn forward_output(id: &str, child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        let module = id.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::info!(target: "module", module = %module, "{}", line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let module = id.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::info!(target: "module", module = %module, stream = "stderr", "{}", line);
            }
        });
    }
}
