// ABOUTME: Module manifest types and the thread-safe manifest/registration store.
// ABOUTME: Scans a modules directory for manifest.json files and records module self-registrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};

/// File name looked up in every module directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Display hints for a module's dashboard widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    #[serde(rename = "type")]
    pub widget_type: String,
    pub component: String,
    pub height: i64,
    pub update_interval: String,
    pub supports_resize: bool,
}

/// Optional per-module settings from the manifest's `config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Data directory relative to the module directory, replacing the default `data`.
    pub storage_path: String,
}

/// Parsed `manifest.json` of a module. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleManifest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub widget: WidgetConfig,
    /// host:port the module's gRPC server listens on once started
    pub grpc_addr: String,
    /// Platform key (linux, darwin, windows) to executable file name
    pub executable: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ModuleSettings>,
}

impl ModuleManifest {
    /// The manifest-specified data directory override, if any.
    pub fn storage_override(&self) -> Option<&str> {
        self.config
            .as_ref()
            .map(|c| c.storage_path.as_str())
            .filter(|p| !p.is_empty())
    }
}

/// A module's announcement that it is up, received over the hub RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModule {
    pub id: String,
    pub version: String,
    pub pid: i32,
    pub registered_at: DateTime<Utc>,
}

/// The modules directory itself could not be read.
#[derive(Error, Debug)]
#[error("failed to read modules directory {}: {source}", path.display())]
pub struct ScanError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Default)]
struct Tables {
    manifests: BTreeMap<String, ModuleManifest>,
    registered: HashMap<String, RegisteredModule>,
}

/// Discovered manifests keyed by module ID plus runtime registrations.
///
/// Every value is installed whole under the write lock, so readers never see a
/// partially written manifest. Accessors hand out copies, never the tables.
#[derive(Default)]
pub struct ManifestStore {
    tables: RwLock<Tables>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Values are replaced atomically, so a poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load `manifest.json` from every immediate subdirectory of `modules_dir`.
    ///
    /// Broken entries (missing file, invalid JSON, empty ID) are skipped. Parsed
    /// manifests replace any previous entry with the same ID; entries whose
    /// directory disappeared stay until a later scan overwrites them.
    /// Returns the number of manifests loaded by this scan.
    pub fn scan(&self, modules_dir: &Path) -> Result<usize, ScanError> {
        let entries = std::fs::read_dir(modules_dir).map_err(|source| ScanError {
            path: modules_dir.to_path_buf(),
            source,
        })?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let manifest_path = entry.path().join(MANIFEST_FILE);
            let Some(manifest) = load_manifest(&manifest_path) else {
                continue;
            };

            self.write().manifests.insert(manifest.id.clone(), manifest);
            loaded += 1;
        }

        info!(dir = %modules_dir.display(), loaded, "Scanned modules directory");
        Ok(loaded)
    }

    /// Record a module's self-registration. Last write wins.
    pub fn register(&self, id: &str, version: &str, pid: i32) {
        let entry = RegisteredModule {
            id: id.to_string(),
            version: version.to_string(),
            pid,
            registered_at: Utc::now(),
        };
        self.write().registered.insert(id.to_string(), entry);
    }

    /// Snapshot of all manifests, ordered by ID.
    pub fn list(&self) -> Vec<ModuleManifest> {
        self.read().manifests.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<ModuleManifest> {
        self.read().manifests.get(id).cloned()
    }

    pub fn registration(&self, id: &str) -> Option<RegisteredModule> {
        self.read().registered.get(id).cloned()
    }

    pub fn registrations(&self) -> Vec<RegisteredModule> {
        self.read().registered.values().cloned().collect()
    }
}

fn load_manifest(path: &Path) -> Option<ModuleManifest> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping module without readable manifest");
            return None;
        }
    };

    let manifest: ModuleManifest = match serde_json::from_slice(&data) {
        Ok(m) => m,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping invalid manifest");
            return None;
        }
    };

    if manifest.id.is_empty() {
        debug!(path = %path.display(), "Skipping manifest without id");
        return None;
    }

    Some(manifest)
}
