// ABOUTME: Module lifecycle and aggregation core for the hub.
// ABOUTME: Discovers module manifests, supervises module processes, and aggregates their status.

pub mod aggregation;
pub mod config;
pub mod install;
pub mod manifest;
pub mod platform;
pub mod rpc;
pub mod supervisor;

pub use aggregation::{AggregationService, HubError, LifecycleCommand, ModuleSummary};
pub use config::{AggregationConfig, CompanionModule, HubConfig, SupervisorConfig};
pub use install::{install_module, InstallError, UploadedFile};
pub use manifest::{ManifestStore, ModuleManifest, RegisteredModule, ScanError, WidgetConfig};
pub use supervisor::{LaunchOptions, ProcessSupervisor, StartOutcome, SupervisorError};
