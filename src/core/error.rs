use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installer backend.
/// Every module returns `Result<T, InstallerError>`.
#[derive(Debug, Error)]
pub enum InstallerError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Destination {path:?} is unusable: {reason}")]
    DestinationUnusable { path: PathBuf, reason: String },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {file}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        file: String,
        expected: String,
        actual: String,
    },

    // ── Catalog ─────────────────────────────────────────
    #[error("Manifest error on line {line}: {message}")]
    Manifest { line: usize, message: String },

    #[error("Catalogs unavailable: {0}")]
    CatalogUnavailable(String),

    // ── External processes ──────────────────────────────
    #[error("Failed to start {program}: {source}")]
    ProcessSpawn {
        program: String,
        source: std::io::Error,
    },

    #[error("External installer exited with code {code:?}")]
    ExternalInstaller { code: Option<i32> },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type InstallerResult<T> = Result<T, InstallerError>;

impl InstallerError {
    /// Attach a path to an IO error, the way every filesystem call site does.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallerError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for InstallerError {
    fn from(source: std::io::Error) -> Self {
        InstallerError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for reports ───────────────────────────
// Failures end up inside `InstallReport`, which is printed as JSON.
impl serde::Serialize for InstallerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
