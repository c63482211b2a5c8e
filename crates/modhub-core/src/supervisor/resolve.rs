// ABOUTME: Locates a module's executable, data directory, and working directory.
// ABOUTME: Falls back to a companion repository's build output when the module isn't installed.

use std::path::{Component, Path, PathBuf};

use crate::config::CompanionModule;
use crate::manifest::ModuleManifest;
use crate::platform::{platform_aliases, platform_key};
use crate::supervisor::error::SupervisorError;

/// Executable file name for the running platform.
pub fn executable_name(manifest: &ModuleManifest) -> Result<&str, SupervisorError> {
    if manifest.executable.is_empty() {
        return Err(SupervisorError::ExecutableNotConfigured(manifest.id.clone()));
    }
    std::iter::once(platform_key())
        .chain(platform_aliases().iter().copied())
        .find_map(|key| manifest.executable.get(key))
        .map(String::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| SupervisorError::ExecutableNotConfiguredForPlatform {
            id: manifest.id.clone(),
            platform: platform_key().to_string(),
        })
}

/// Find the executable to launch.
///
/// `<modules_dir>/<id>/<name>` is tried first. A companion module then falls back
/// to its repository's release locations, then its dev locations. With
/// `require_release` a dev build is refused and reported as a missing release.
pub fn resolve_executable(
    manifest: &ModuleManifest,
    modules_dir: &Path,
    companion: Option<&CompanionModule>,
    require_release: bool,
) -> Result<PathBuf, SupervisorError> {
    let name = executable_name(manifest)?;
    let mut searched = Vec::new();

    let installed = modules_dir.join(&manifest.id).join(name);
    if installed.is_file() {
        return Ok(installed);
    }
    searched.push(installed);

    let Some(companion) = companion else {
        return Err(SupervisorError::ExecutableNotFound {
            id: manifest.id.clone(),
            name: name.to_string(),
            searched,
        });
    };

    let repo = modules_dir.join(&companion.repo_dir);
    for dir in &companion.release_dirs {
        let candidate = repo.join(dir).join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    for dir in &companion.dev_dirs {
        let candidate = repo.join(dir).join(name);
        if candidate.is_file() {
            if require_release {
                tracing::warn!(
                    module = %manifest.id,
                    path = %candidate.display(),
                    "Refusing dev build for UI launch"
                );
                break;
            }
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    if require_release {
        return Err(SupervisorError::ReleaseBuildNotFound {
            id: manifest.id.clone(),
            hint: companion.build_hint.clone(),
        });
    }

    Err(SupervisorError::ExecutableNotFound {
        id: manifest.id.clone(),
        name: name.to_string(),
        searched,
    })
}

/// Data directory handed to the module via `--data-dir`.
///
/// A companion with a shared data directory uses it, so a module keeps the same
/// state whether it is launched standalone or by the hub. Otherwise the
/// manifest's `storage_path` or `data` under the module directory.
pub fn resolve_data_dir(
    manifest: &ModuleManifest,
    modules_dir: &Path,
    companion: Option<&CompanionModule>,
) -> Result<PathBuf, SupervisorError> {
    if let Some(shared) = companion.and_then(|c| c.shared_data_dir.as_ref()) {
        let base = dirs::config_dir()
            .ok_or_else(|| SupervisorError::NoConfigDir(manifest.id.clone()))?;
        return Ok(base.join(shared));
    }

    let module_dir = modules_dir.join(&manifest.id);
    match manifest.storage_override() {
        None => Ok(module_dir.join("data")),
        Some(path) if is_contained_relative(Path::new(path)) => Ok(module_dir.join(path)),
        Some(path) => Err(SupervisorError::InvalidStoragePath {
            id: manifest.id.clone(),
            path: path.to_string(),
        }),
    }
}

/// Working directory for the child: the module directory if present, else the executable's.
pub fn working_dir(manifest: &ModuleManifest, modules_dir: &Path, executable: &Path) -> PathBuf {
    let module_dir = modules_dir.join(&manifest.id);
    if module_dir.is_dir() {
        return module_dir;
    }
    executable
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(module_dir)
}

/// True for relative paths made only of plain segments (no root, `..`, or prefix).
pub fn is_contained_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some()
        && components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
