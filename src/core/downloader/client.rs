use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use super::source::ArtifactSource;
use crate::core::catalog::Artifact;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::orchestrator::EventSink;

/// Default number of partitions fetched side by side.
pub const DEFAULT_PARTITIONS: usize = 2;

/// What happened to one artifact.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Fetched { path: PathBuf, bytes: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub artifact: Artifact,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn is_fetched(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Fetched { .. })
    }
}

/// Partitioned downloader: artifacts are split into at most `partitions`
/// contiguous slices, slices run concurrently, items inside a slice run in
/// order. One failed artifact never stops the rest.
pub struct Fetcher {
    source: Arc<dyn ArtifactSource>,
    /// Upper bound on simultaneous transfers.
    partitions: usize,
    events: Option<EventSink>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn ArtifactSource>, events: Option<EventSink>) -> Self {
        Self {
            source,
            partitions: DEFAULT_PARTITIONS,
            events,
        }
    }

    pub fn with_partitions(mut self, n: usize) -> Self {
        self.partitions = n.max(1);
        self
    }

    // ── Batch download ──────────────────────────────────

    /// Download every artifact into `scratch_dir`.
    ///
    /// Returns one result per input item, in input order. Each `Fetched`
    /// result points at a complete file; failed items leave nothing behind.
    pub async fn fetch_all(&self, items: &[Artifact], scratch_dir: &Path) -> Vec<FetchResult> {
        if items.is_empty() {
            return Vec::new();
        }

        let partitions = partition(items, self.partitions);
        info!(
            "Starting batch download: {} files in {} partitions",
            items.len(),
            partitions.len()
        );

        let runs = partitions.into_iter().map(|slice| async move {
            let mut results = Vec::with_capacity(slice.len());
            for artifact in slice {
                results.push(self.fetch_one(artifact, scratch_dir).await);
            }
            results
        });

        join_all(runs).await.into_iter().flatten().collect()
    }

    // ── Single artifact ─────────────────────────────────

    async fn fetch_one(&self, artifact: &Artifact, scratch_dir: &Path) -> FetchResult {
        self.info(format!("Downloading {}", artifact.display));

        let outcome = match self.download(artifact, scratch_dir).await {
            Ok((path, bytes)) => {
                self.info(format!("Finished Downloading {}", artifact.display));
                FetchOutcome::Fetched { path, bytes }
            }
            Err(e) => {
                error!("Error while downloading {}: {}", artifact.file, e);
                self.error(format!("Error while Downloading {}", artifact.display));
                FetchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        FetchResult {
            artifact: artifact.clone(),
            outcome,
        }
    }

    /// Fetch into `<file>.part`, verify, then rename into place so a
    /// `Fetched` path is never truncated.
    async fn download(
        &self,
        artifact: &Artifact,
        scratch_dir: &Path,
    ) -> InstallerResult<(PathBuf, u64)> {
        let dest = scratch_dir.join(&artifact.file);
        let partial = scratch_dir.join(format!("{}.part", artifact.file));

        match self.download_to(artifact, &partial, &dest).await {
            Ok(bytes) => {
                debug!("Downloaded: {} -> {:?}", artifact.file, dest);
                Ok((dest, bytes))
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    async fn download_to(
        &self,
        artifact: &Artifact,
        partial: &Path,
        dest: &Path,
    ) -> InstallerResult<u64> {
        let bytes = self.source.fetch_bytes(&artifact.file).await?;

        if let Some(expected) = artifact.sha1.as_deref() {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(InstallerError::Sha1Mismatch {
                    file: artifact.file.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        write_file(partial, &bytes).await?;
        tokio::fs::rename(partial, dest)
            .await
            .map_err(|e| InstallerError::io(dest, e))?;

        Ok(bytes.len() as u64)
    }

    fn info(&self, message: String) {
        if let Some(events) = &self.events {
            events.info(message);
        }
    }

    fn error(&self, message: String) {
        if let Some(events) = &self.events {
            events.error(message);
        }
    }
}

/// Split into at most `count` contiguous, non-empty slices whose sizes
/// differ by at most one, earlier slices taking the extra item.
pub fn partition<T>(items: &[T], count: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return Vec::new();
    }
    let count = count.clamp(1, items.len());
    let size = items.len() / count;
    let extra = items.len() % count;

    let mut slices = Vec::with_capacity(count);
    let mut start = 0;
    for index in 0..count {
        let len = size + usize::from(index < extra);
        slices.push(&items[start..start + len]);
        start += len;
    }
    slices
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// The handle is dropped when this returns, before the caller renames.
async fn write_file(path: &Path, bytes: &[u8]) -> InstallerResult<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| InstallerError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| InstallerError::io(path, e))?;
    file.flush().await.map_err(|e| InstallerError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::core::orchestrator::InstallEvent;

    /// In-memory stand-in for the remote repository.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        pub files: HashMap<String, Vec<u8>>,
        pub in_flight: AtomicUsize,
        pub peak: AtomicUsize,
    }

    impl MemorySource {
        pub fn with(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ArtifactSource for MemorySource {
        async fn fetch_text(&self, name: &str) -> InstallerResult<String> {
            let bytes = self.fetch_bytes(name).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }

        async fn fetch_bytes(&self, name: &str) -> InstallerResult<Bytes> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.files
                .get(name)
                .map(|body| Bytes::from(body.clone()))
                .ok_or_else(|| InstallerError::DownloadFailed {
                    url: name.to_string(),
                    status: 404,
                })
        }
    }

    fn artifacts(names: &[&str]) -> Vec<Artifact> {
        names.iter().map(|n| Artifact::new(n, n)).collect()
    }

    #[test]
    fn partition_matches_half_split() {
        let items = [1, 2, 3, 4, 5];
        let parts = partition(&items, 2);
        assert_eq!(parts, vec![&[1, 2, 3][..], &[4, 5][..]]);

        let parts = partition(&items[..1], 2);
        assert_eq!(parts, vec![&[1][..]]);

        assert!(partition::<u8>(&[], 2).is_empty());
        assert_eq!(partition(&items, 0).len(), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_batch() {
        let scratch = tempfile::tempdir().unwrap();
        let source = Arc::new(MemorySource::with(&[
            ("a.jar", "a"),
            ("c.jar", "c"),
            ("d.jar", "d"),
        ]));
        let (sink, mut rx) = EventSink::channel();
        let fetcher = Fetcher::new(source, Some(sink));

        let results = fetcher
            .fetch_all(&artifacts(&["a.jar", "b.jar", "c.jar", "d.jar"]), scratch.path())
            .await;

        let files: Vec<_> = results.iter().map(|r| r.artifact.file.as_str()).collect();
        assert_eq!(files, vec!["a.jar", "b.jar", "c.jar", "d.jar"]);
        assert!(results[0].is_fetched());
        assert!(!results[1].is_fetched());
        assert!(results[2].is_fetched());
        assert!(results[3].is_fetched());

        assert!(scratch.path().join("a.jar").exists());
        assert!(!scratch.path().join("b.jar").exists());
        assert!(!scratch.path().join("b.jar.part").exists());

        let expected = InstallEvent::Error("Error while Downloading b.jar".into());
        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            saw_error |= event == expected;
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_partitions() {
        let scratch = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..8).map(|i| format!("{i}.jar")).collect();
        let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "x")).collect();
        let source = Arc::new(MemorySource::with(&files));
        let fetcher = Fetcher::new(source.clone(), None).with_partitions(2);

        let items: Vec<_> = names.iter().map(|n| Artifact::new(n, n)).collect();
        let results = fetcher.fetch_all(&items, scratch.path()).await;

        assert!(results.iter().all(FetchResult::is_fetched));
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn checksum_mismatch_is_a_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let source = Arc::new(MemorySource::with(&[("a.jar", "payload")]));
        let fetcher = Fetcher::new(source, None);

        let mut good = Artifact::new("a.jar", "A");
        good.sha1 = Some(sha1_hex(b"payload").to_uppercase());
        let results = fetcher.fetch_all(&[good], scratch.path()).await;
        assert!(results[0].is_fetched());

        let mut bad = Artifact::new("a.jar", "A");
        bad.sha1 = Some("0000".into());
        std::fs::remove_file(scratch.path().join("a.jar")).unwrap();
        let results = fetcher.fetch_all(&[bad], scratch.path()).await;
        assert!(!results[0].is_fetched());
        assert!(!scratch.path().join("a.jar").exists());
    }
}
