use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures_util::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::hook::PostInstallHook;
use crate::core::catalog::{CatalogOption, OptionKind};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::orchestrator::EventSink;

const UNKNOWN_ERROR: &str = "An unknown error occurred, please submit the log file";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// The destination itself could not be prepared; nothing was moved.
    Aborted { reason: String },
}

/// One item that failed a stage step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StageFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub destination: PathBuf,
    pub status: StageStatus,
    /// Stale files removed during the pre-clean.
    pub removed: Vec<String>,
    /// Files now present in the destination, in move order.
    pub staged: Vec<String>,
    pub clean_failures: Vec<StageFailure>,
    pub move_failures: Vec<StageFailure>,
    pub hook_failures: Vec<StageFailure>,
}

impl StageResult {
    fn new(destination: &Path) -> Self {
        Self {
            destination: destination.to_path_buf(),
            status: StageStatus::Completed,
            removed: Vec::new(),
            staged: Vec::new(),
            clean_failures: Vec::new(),
            move_failures: Vec::new(),
            hook_failures: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }
}

/// Replaces the contents of a destination folder with staged artifacts.
pub struct Stager {
    scratch_dir: PathBuf,
    events: Option<EventSink>,
}

impl Stager {
    pub fn new(scratch_dir: impl Into<PathBuf>, events: Option<EventSink>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            events,
        }
    }

    /// Clear `destination` (regular files directly inside it only), move
    /// every item's scratch file into it, then run `hook` for each mod that
    /// landed. Per-item failures are recorded and skipped; only an unusable
    /// destination aborts, and it aborts before anything is moved.
    pub async fn install(
        &self,
        destination: &Path,
        items: &[CatalogOption],
        hook: Option<&dyn PostInstallHook>,
    ) -> StageResult {
        let mut result = StageResult::new(destination);

        if let Err(e) = self.prepare_destination(destination, &mut result).await {
            error!("Cannot stage into {:?}: {}", destination, e);
            self.error(UNKNOWN_ERROR);
            result.status = StageStatus::Aborted {
                reason: e.to_string(),
            };
            return result;
        }

        // ── Move phase ──
        let mut moved = Vec::with_capacity(items.len());
        for item in items {
            self.info(format!("Moving {}", item.file));
            let from = self.scratch_dir.join(&item.file);
            let to = destination.join(&item.file);

            match move_file(&from, &to).await {
                Ok(()) => {
                    self.info(format!("Finished Moving {}", item.file));
                    result.staged.push(item.file.clone());
                    moved.push(item);
                }
                Err(e) => {
                    warn!("Failed moving {}: {}", item.file, e);
                    self.error(format!("Failed Moving {}", item.display));
                    result.move_failures.push(StageFailure {
                        file: item.file.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        // ── Post-install phase (mods only, after every move) ──
        if let Some(hook) = hook {
            for item in moved.into_iter().filter(|i| i.kind == OptionKind::Mod) {
                let outcome = AssertUnwindSafe(hook.after_install(item, destination))
                    .catch_unwind()
                    .await;
                let failure = match outcome {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => e.to_string(),
                    Err(payload) => format!("hook panicked: {}", panic_message(payload.as_ref())),
                };
                error!("Post-install hook failed for {}: {}", item.id, failure);
                self.error(UNKNOWN_ERROR);
                result.hook_failures.push(StageFailure {
                    file: item.file.clone(),
                    error: failure,
                });
            }
        }

        info!(
            "Staged {}/{} files into {:?}",
            result.staged.len(),
            items.len(),
            destination
        );
        result
    }

    async fn prepare_destination(
        &self,
        destination: &Path,
        result: &mut StageResult,
    ) -> InstallerResult<()> {
        match tokio::fs::metadata(destination).await {
            Ok(meta) if meta.is_dir() => {
                info!("{:?} exists, clearing files", destination);
                self.clear_files(destination, result).await
            }
            Ok(_) => Err(InstallerError::DestinationUnusable {
                path: destination.to_path_buf(),
                reason: "not a directory".to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{:?} does not exist, creating it", destination);
                tokio::fs::create_dir_all(destination)
                    .await
                    .map_err(|e| InstallerError::io(destination, e))
            }
            Err(e) => Err(InstallerError::io(destination, e)),
        }
    }

    /// Non-recursive: subdirectories and their contents are left alone.
    async fn clear_files(&self, destination: &Path, result: &mut StageResult) -> InstallerResult<()> {
        let mut entries = tokio::fs::read_dir(destination)
            .await
            .map_err(|e| InstallerError::io(destination, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| InstallerError::io(destination, e))?
        {
            // Follows symlinks: a link to a file is cleared, a link to a
            // folder is kept. Dangling links are cleared too.
            let is_file = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta.is_file(),
                Err(_) => entry
                    .file_type()
                    .await
                    .map(|file_type| file_type.is_symlink())
                    .unwrap_or(false),
            };
            if !is_file {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!("Removed stale {}", name);
                    result.removed.push(name);
                }
                Err(e) => {
                    warn!("Failed deleting {}: {}", name, e);
                    self.error(format!("Failed Deleting {}", name));
                    result.clean_failures.push(StageFailure {
                        file: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn info(&self, message: String) {
        if let Some(events) = &self.events {
            events.info(message);
        }
    }

    fn error(&self, message: impl Into<String>) {
        if let Some(events) = &self.events {
            events.error(message);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Rename, falling back to copy + delete when scratch and destination sit
/// on different filesystems.
pub async fn move_file(from: &Path, to: &Path) -> InstallerResult<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    tokio::fs::copy(from, to)
        .await
        .map_err(|e| InstallerError::io(from, e))?;
    if let Err(e) = tokio::fs::remove_file(from).await {
        debug!("Leaving scratch copy {:?}: {}", from, e);
    }
    Ok(())
}
