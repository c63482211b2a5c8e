// ABOUTME: Installs an uploaded module into the modules directory.
// ABOUTME: Validates the manifest and file paths, writes files, and marks the executable runnable.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::manifest::{ModuleManifest, MANIFEST_FILE};
use crate::supervisor::executable_name;

/// One file from an upload, named by its path relative to the module directory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: String,
    pub contents: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("manifest.json is required")]
    MissingManifest,

    #[error("invalid manifest.json: {0}")]
    InvalidManifest(#[from] serde_json::Error),

    #[error("manifest id is required")]
    MissingId,

    #[error("manifest id {0:?} is not a valid directory name")]
    InvalidId(String),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Relative path made of plain segments, or None if the name could escape the module directory.
fn sanitize(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

fn is_single_segment(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Write an uploaded module to `<modules_dir>/<id>/` and return its ID.
pub async fn install_module(
    modules_dir: &Path,
    files: Vec<UploadedFile>,
) -> Result<String, InstallError> {
    let manifest_bytes = files
        .iter()
        .find(|f| sanitize(&f.path).is_some_and(|p| p == Path::new(MANIFEST_FILE)))
        .map(|f| f.contents.as_slice())
        .ok_or(InstallError::MissingManifest)?;

    let manifest: ModuleManifest = serde_json::from_slice(manifest_bytes)?;
    if manifest.id.is_empty() {
        return Err(InstallError::MissingId);
    }
    if !is_single_segment(&manifest.id) {
        return Err(InstallError::InvalidId(manifest.id));
    }

    let module_dir = modules_dir.join(&manifest.id);
    tokio::fs::create_dir_all(&module_dir)
        .await
        .map_err(|source| InstallError::Write {
            path: module_dir.clone(),
            source,
        })?;

    let exe = executable_name(&manifest).ok().map(PathBuf::from);
    let mut seen = HashSet::new();

    for file in &files {
        let Some(relative) = sanitize(&file.path) else {
            tracing::debug!(module = %manifest.id, path = %file.path, "Skipping unsafe upload path");
            continue;
        };
        if !seen.insert(relative.clone()) {
            tracing::debug!(module = %manifest.id, path = %file.path, "Skipping duplicate upload path");
            continue;
        }

        let target = module_dir.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| InstallError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&target, &file.contents)
            .await
            .map_err(|source| InstallError::Write {
                path: target.clone(),
                source,
            })?;

        if exe.as_deref() == Some(relative.as_path()) {
            mark_executable(&target).await?;
        }
    }

    tracing::info!(module = %manifest.id, files = seen.len(), "Installed module");
    Ok(manifest.id)
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|source| InstallError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}
