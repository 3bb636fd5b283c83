use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::catalog::OptionKind;
use crate::core::downloader::client::DEFAULT_PARTITIONS;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::java::probe::{DEFAULT_ACCEPTED_PREFIX, DEFAULT_DOWNLOAD_LINK};
use crate::core::java::RuntimeProbe;

const APP_DIR_NAME: &str = "SkyblockInstaller";
const SETTINGS_FILE: &str = "installer_settings.json";
const DEFAULT_REMOTE_BASE: &str =
    "https://raw.githubusercontent.com/nacrt/SkyblockClient-REPO/main/files";
const INSTALL_DIR_NAME: &str = "skyclient";
const SCRATCH_DIR_NAME: &str = "skyblock-installer";

/// User-tunable settings, persisted as JSON in the platform data dir.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallerSettings {
    pub remote_base_url: String,
    pub minecraft_root: PathBuf,
    /// Parent of the `mods/` and `resourcepacks/` destinations. Unset
    /// means `<minecraft_root>/skyclient`, following `minecraft_root`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_root: Option<PathBuf>,
    pub scratch_dir: PathBuf,
    pub fetch_partitions: usize,
    pub runtime_probe: RuntimeProbe,
    pub accepted_runtime_prefix: String,
    pub runtime_download_link: String,
    pub open_remediation_link: bool,
    pub external_installer_file: String,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            remote_base_url: DEFAULT_REMOTE_BASE.to_string(),
            minecraft_root: default_minecraft_root(),
            install_root: None,
            scratch_dir: std::env::temp_dir().join(SCRATCH_DIR_NAME),
            fetch_partitions: DEFAULT_PARTITIONS,
            runtime_probe: RuntimeProbe::default(),
            accepted_runtime_prefix: DEFAULT_ACCEPTED_PREFIX.to_string(),
            runtime_download_link: DEFAULT_DOWNLOAD_LINK.to_string(),
            open_remediation_link: true,
            external_installer_file: "forge.exe".to_string(),
        }
    }
}

impl InstallerSettings {
    pub fn install_root(&self) -> PathBuf {
        match &self.install_root {
            Some(root) => root.clone(),
            None => self.minecraft_root.join(INSTALL_DIR_NAME),
        }
    }

    /// Destination folder for one catalog kind.
    pub fn destination(&self, kind: OptionKind) -> PathBuf {
        self.install_root().join(kind.folder_name())
    }

    /// Load from `path`, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Ignoring invalid settings {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                debug!("No settings at {:?} ({}), using defaults", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> InstallerResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| InstallerError::io(path, e))
    }
}

/// Where `installer_settings.json` lives unless overridden.
pub fn default_settings_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(SETTINGS_FILE)
}

fn default_minecraft_root() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "windows") {
        dirs::config_dir()
            .unwrap_or(home)
            .join(".minecraft")
    } else if cfg!(target_os = "macos") {
        home.join("Library")
            .join("Application Support")
            .join("minecraft")
    } else {
        home.join(".minecraft")
    }
}
