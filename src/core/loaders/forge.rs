use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;
use tracing::{error, info, warn};

use super::context::InstallContext;
use crate::core::catalog::Artifact;
use crate::core::downloader::FetchOutcome;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::java::{self, RuntimeCheck};
use crate::core::orchestrator::{notify, EventSink, InstallEvent};

/// File every initialised game directory contains; the Forge installer
/// refuses to run without it.
const LAUNCHER_PROFILES: &str = "launcher_profiles.json";

/// How the external installer branch ended. Only `Exited { code: 0 }`
/// means Forge actually ran to completion.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForgeOutcome {
    InvalidGameDirectory,
    RuntimeRejected { check: RuntimeCheck },
    DownloadFailed { error: String },
    LaunchFailed { error: String },
    Exited { code: Option<i32> },
}

impl ForgeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ForgeOutcome::Exited { code: Some(0) })
    }
}

/// Downloads and runs the bundled Forge installer executable, gated on the
/// Java runtime version.
pub struct ForgeInstaller {
    installer_file: String,
}

impl ForgeInstaller {
    pub fn new(installer_file: &str) -> Self {
        Self {
            installer_file: installer_file.to_string(),
        }
    }

    /// Validate the game directory, gate on the runtime and download the
    /// installer. `Err` carries the outcome that ends the branch early.
    pub async fn prepare(&self, ctx: &InstallContext<'_>) -> Result<PathBuf, ForgeOutcome> {
        if !is_valid_minecraft_dir(ctx.minecraft_root) {
            let message = format!(
                "\"{}\" is not a valid minecraft directory.\nMake sure you run the minecraft launcher at least once.",
                ctx.minecraft_root.display()
            );
            warn!("{}", message);
            notify(ctx.events, InstallEvent::Error(message));
            return Err(ForgeOutcome::InvalidGameDirectory);
        }

        let check = java::check_runtime(ctx.runtime_probe, ctx.accepted_runtime_prefix).await;
        if !check.ok {
            for line in java::remediation_lines(ctx.runtime_download_link) {
                notify(ctx.events, InstallEvent::Error(line));
            }
            if ctx.open_remediation_link {
                if let Err(e) = open::that_detached(ctx.runtime_download_link) {
                    warn!("Could not open {}: {}", ctx.runtime_download_link, e);
                }
            }
            return Err(ForgeOutcome::RuntimeRejected { check });
        }

        notify(ctx.events, InstallEvent::Info("Downloading Forge".into()));
        let artifact = Artifact::new(&self.installer_file, "Forge");
        let fetched = ctx.fetcher.fetch_all(&[artifact], ctx.scratch_dir).await;
        match fetched.into_iter().next().map(|r| r.outcome) {
            Some(FetchOutcome::Fetched { path, .. }) => {
                notify(ctx.events, InstallEvent::Info("Finished Downloading Forge".into()));
                Ok(path)
            }
            Some(FetchOutcome::Failed { error }) => Err(ForgeOutcome::DownloadFailed { error }),
            None => Err(ForgeOutcome::DownloadFailed {
                error: "no result for installer download".into(),
            }),
        }
    }

    /// Run the downloaded installer and wait for it to exit.
    pub async fn launch(&self, installer_path: &Path, events: Option<&EventSink>) -> ForgeOutcome {
        info!("Launching {:?}", installer_path);
        match run_installer(installer_path).await {
            Ok(code) => {
                if code != Some(0) {
                    let e = InstallerError::ExternalInstaller { code };
                    error!("{}", e);
                    notify(events, InstallEvent::Error(e.to_string()));
                }
                ForgeOutcome::Exited { code }
            }
            Err(e) => {
                error!("Could not launch Forge installer: {}", e);
                notify(events, InstallEvent::Error(e.to_string()));
                ForgeOutcome::LaunchFailed {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// A game directory is usable once the official launcher has run in it.
pub fn is_valid_minecraft_dir(root: &Path) -> bool {
    root.is_dir() && root.join(LAUNCHER_PROFILES).is_file()
}

/// Launch through the platform shell and wait for exit.
pub async fn run_installer(path: &Path) -> InstallerResult<Option<i32>> {
    let mut command = shell_command(path)?;
    let status = command
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|source| InstallerError::ProcessSpawn {
            program: path.display().to_string(),
            source,
        })?;
    Ok(status.code())
}

#[cfg(windows)]
fn shell_command(path: &Path) -> InstallerResult<Command> {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(path);
    Ok(command)
}

#[cfg(not(windows))]
fn shell_command(path: &Path) -> InstallerResult<Command> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| InstallerError::io(path, e))?;

    // `$0` keeps the path out of the script text, so no quoting is needed.
    let mut command = Command::new("sh");
    command.arg("-c").arg("exec \"$0\"").arg(path);
    Ok(command)
}
