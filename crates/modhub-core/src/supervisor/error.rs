// ABOUTME: Errors reported by module start and stop requests.
// ABOUTME: Configuration, resolution, launch, and readiness failures each get a distinct variant.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("module id is required")]
    MissingId,

    #[error("grpc_addr is required for {0}")]
    MissingRpcAddress(String),

    #[error("executable is not configured for {0}")]
    ExecutableNotConfigured(String),

    #[error("executable for {id} is not set for {platform}")]
    ExecutableNotConfiguredForPlatform { id: String, platform: String },

    #[error("executable {name} not found for {id} (searched: {})", display_paths(.searched))]
    ExecutableNotFound {
        id: String,
        name: String,
        searched: Vec<PathBuf>,
    },

    #[error("release build not found for {id}; {}", .hint.as_deref().unwrap_or("build it first"))]
    ReleaseBuildNotFound { id: String, hint: Option<String> },

    #[error("storage_path {path:?} for {id} must be a relative path inside the module directory")]
    InvalidStoragePath { id: String, path: String },

    #[error("could not determine the platform config directory for {0}")]
    NoConfigDir(String),

    #[error("failed to create data dir {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {id}: {source}")]
    Spawn {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("grpc not ready at {addr} for {id} after {}ms", .timeout.as_millis())]
    NotReady {
        id: String,
        addr: String,
        timeout: Duration,
    },

    #[error("{0} exited before its grpc server became ready")]
    ExitedEarly(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
