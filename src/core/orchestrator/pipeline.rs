// ─── Install Pipeline ───
// Selector → Fetcher → Stager per catalog, with the gated Forge installer
// as an optional concurrent branch. One operation runs at a time.

use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::events::{EventSink, InstallEvent};
use crate::core::catalog::{fetch_catalog, Catalog, CatalogOption, OptionKind, Selection};
use crate::core::downloader::{ArtifactSource, FetchOutcome, Fetcher};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::loaders::{ForgeInstaller, ForgeOutcome, InstallContext};
use crate::core::selector;
use crate::core::stager::{PostInstallHook, StageResult, Stager};
use crate::core::state::InstallerSettings;

pub const FORGE_AND_MODS_COMPLETED: &str = "All the mods have been installed. Now you just need to press \"OK\" on the Minecraft Forge window";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Resolving,
    Fetching,
    Staging,
    GatingPrereq,
    RunningExternalInstaller,
    Completed,
    Failed,
}

impl PipelineState {
    /// Position along `Idle → Resolving → Fetching → Staging → GatingPrereq
    /// → RunningExternalInstaller → Completed`. `Failed` is terminal.
    fn rank(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Resolving => 1,
            PipelineState::Fetching => 2,
            PipelineState::Staging => 3,
            PipelineState::GatingPrereq => 4,
            PipelineState::RunningExternalInstaller => 5,
            PipelineState::Completed => 6,
            PipelineState::Failed => 7,
        }
    }
}

/// What a state change refers to: one concurrent branch, or the operation
/// as a whole.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Operation,
    Mods,
    Resourcepacks,
    Forge,
}

impl From<OptionKind> for Branch {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::Mod => Branch::Mods,
            OptionKind::Resourcepack => Branch::Resourcepacks,
        }
    }
}

/// Per-branch states of the running operation. The operation-level state
/// is the least advanced branch, so it only ever moves forward.
#[derive(Debug)]
struct Progress {
    operation: PipelineState,
    branches: Vec<(Branch, PipelineState)>,
}

impl Progress {
    fn new(branches: &[Branch]) -> Self {
        Self {
            operation: PipelineState::Idle,
            branches: branches.iter().map(|&b| (b, PipelineState::Idle)).collect(),
        }
    }

    fn lowest(&self) -> Option<PipelineState> {
        self.branches
            .iter()
            .map(|&(_, state)| state)
            .min_by_key(|state| state.rank())
    }
}

/// User-facing operations.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Mods,
    Resourcepacks,
    Forge,
    ForgeAndMods,
    /// Forge, mods and resource packs side by side.
    All,
}

impl Operation {
    fn includes_mods(self) -> bool {
        matches!(self, Operation::Mods | Operation::ForgeAndMods | Operation::All)
    }

    fn includes_resourcepacks(self) -> bool {
        matches!(self, Operation::Resourcepacks | Operation::All)
    }

    fn includes_forge(self) -> bool {
        matches!(self, Operation::Forge | Operation::ForgeAndMods | Operation::All)
    }

    fn branches(self) -> Vec<Branch> {
        let mut branches = Vec::with_capacity(3);
        if self.includes_forge() {
            branches.push(Branch::Forge);
        }
        if self.includes_mods() {
            branches.push(Branch::Mods);
        }
        if self.includes_resourcepacks() {
            branches.push(Branch::Resourcepacks);
        }
        branches
    }

    pub fn completion_message(self) -> &'static str {
        match self {
            Operation::Mods => "All the mods have been installed.",
            Operation::Resourcepacks => "All the resource packs have been installed.",
            Operation::Forge => "The Minecraft Forge installer has finished.",
            Operation::ForgeAndMods => FORGE_AND_MODS_COMPLETED,
            Operation::All => "All the mods and resource packs have been installed. Now you just need to press \"OK\" on the Minecraft Forge window",
        }
    }
}

/// Both catalogs for the session.
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub mods: Catalog,
    pub resourcepacks: Catalog,
}

impl Catalogs {
    pub fn get(&self, kind: OptionKind) -> &Catalog {
        match kind {
            OptionKind::Mod => &self.mods,
            OptionKind::Resourcepack => &self.resourcepacks,
        }
    }

    pub fn default_selections(&self) -> Selections {
        Selections {
            mods: Selection::defaults(&self.mods),
            resourcepacks: Selection::defaults(&self.resourcepacks),
        }
    }
}

/// Toggle snapshots for both catalogs, frozen when the install starts.
#[derive(Debug, Clone, Default)]
pub struct Selections {
    pub mods: Selection,
    pub resourcepacks: Selection,
}

impl Selections {
    pub fn get(&self, kind: OptionKind) -> &Selection {
        match kind {
            OptionKind::Mod => &self.mods,
            OptionKind::Resourcepack => &self.resourcepacks,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub file: String,
    pub error: String,
}

/// Result of one catalog's resolve → fetch → stage run.
#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    pub kind: OptionKind,
    /// Effective install set, by id.
    pub resolved: Vec<String>,
    pub fetch_failures: Vec<FetchFailure>,
    pub stage: StageResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub run_id: String,
    pub operation: Operation,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: PipelineState,
    /// Why the run never started, when `state` is `Failed`.
    pub failure: Option<String>,
    pub mods: Option<BranchReport>,
    pub resourcepacks: Option<BranchReport>,
    pub forge: Option<ForgeOutcome>,
}

/// Sequences catalog loading and installs, reporting through an optional
/// event sink.
pub struct Orchestrator {
    settings: InstallerSettings,
    source: Arc<dyn ArtifactSource>,
    hook: Arc<dyn PostInstallHook>,
    events: Option<EventSink>,
    progress: std::sync::Mutex<Progress>,
    /// Held for the whole of an operation: one stager per destination.
    run_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        settings: InstallerSettings,
        source: Arc<dyn ArtifactSource>,
        hook: Arc<dyn PostInstallHook>,
        events: Option<EventSink>,
    ) -> Self {
        Self {
            settings,
            source,
            hook,
            events,
            progress: std::sync::Mutex::new(Progress::new(&[])),
            run_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &InstallerSettings {
        &self.settings
    }

    /// Operation-level state.
    pub fn state(&self) -> PipelineState {
        self.progress().operation
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: PipelineState) {
        let mut progress = self.progress();
        progress.operation = state;
        self.emit(InstallEvent::StateChanged {
            branch: Branch::Operation,
            state,
        });
    }

    /// Move one branch forward, then lift the operation-level state to the
    /// least advanced branch if that moved. Events are sent under the lock
    /// so their order matches the recorded transitions.
    fn advance(&self, branch: Branch, state: PipelineState) {
        let mut progress = self.progress();
        if let Some(entry) = progress.branches.iter_mut().find(|(b, _)| *b == branch) {
            entry.1 = state;
        }
        self.emit(InstallEvent::StateChanged { branch, state });

        if let Some(lowest) = progress.lowest() {
            if lowest.rank() > progress.operation.rank() {
                progress.operation = lowest;
                self.emit(InstallEvent::StateChanged {
                    branch: Branch::Operation,
                    state: lowest,
                });
            }
        }
    }

    fn emit(&self, event: InstallEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    // ── Catalogs ────────────────────────────────────────

    /// Fetch both manifests concurrently. A single unreachable manifest
    /// leaves that catalog empty; losing both means nothing can be installed.
    pub async fn load_catalogs(&self) -> InstallerResult<Catalogs> {
        let (mods, resourcepacks) = tokio::join!(
            fetch_catalog(self.source.as_ref(), OptionKind::Mod),
            fetch_catalog(self.source.as_ref(), OptionKind::Resourcepack),
        );

        let catalogs = match (mods, resourcepacks) {
            (Err(mods_err), Err(packs_err)) => {
                self.report_connection_error();
                let e = InstallerError::CatalogUnavailable(format!(
                    "mods: {mods_err}; resourcepacks: {packs_err}"
                ));
                error!("{}", e);
                self.set_state(PipelineState::Failed);
                return Err(e);
            }
            (mods, resourcepacks) => Catalogs {
                mods: self.catalog_or_empty(OptionKind::Mod, mods),
                resourcepacks: self.catalog_or_empty(OptionKind::Resourcepack, resourcepacks),
            },
        };

        for catalog in [&catalogs.mods, &catalogs.resourcepacks] {
            for (id, dependency) in catalog.dangling_dependencies() {
                warn!(
                    "Manifest {}: '{}' depends on unknown '{}'",
                    catalog.kind().manifest_name(),
                    id,
                    dependency
                );
            }
        }

        Ok(catalogs)
    }

    fn catalog_or_empty(&self, kind: OptionKind, result: InstallerResult<Catalog>) -> Catalog {
        result.unwrap_or_else(|e| {
            error!("Could not load {}: {}", kind.manifest_name(), e);
            self.report_connection_error();
            Catalog::empty(kind)
        })
    }

    fn report_connection_error(&self) {
        self.emit(InstallEvent::Error("ERROR CONNECTING TO GITHUB".into()));
        self.emit(InstallEvent::Error("\tAre you using a proxy?".into()));
        self.emit(InstallEvent::Error(
            "\tYou might also be using an outdated version! Update!".into(),
        ));
    }

    // ── Install ─────────────────────────────────────────

    /// Run one operation to completion. `Completed` is emitted once, after
    /// every branch has finished, whatever per-item failures occurred.
    pub async fn install(
        &self,
        operation: Operation,
        catalogs: &Catalogs,
        selections: &Selections,
    ) -> InstallReport {
        let _guard = self.run_lock.lock().await;
        *self.progress() = Progress::new(&operation.branches());
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Starting {:?} (run {})", operation, run_id);

        let mut report = InstallReport {
            run_id,
            operation,
            started_at,
            finished_at: started_at,
            state: PipelineState::Idle,
            failure: None,
            mods: None,
            resourcepacks: None,
            forge: None,
        };

        let scratch_dir = self.settings.scratch_dir.as_path();
        if let Err(e) = prepare_scratch_dir(scratch_dir).await {
            error!("Cannot prepare scratch directory: {}", e);
            self.emit(InstallEvent::Error(format!(
                "Could not prepare the download folder {}: {}",
                scratch_dir.display(),
                e
            )));
            self.set_state(PipelineState::Failed);
            report.state = PipelineState::Failed;
            report.failure = Some(e.to_string());
            report.finished_at = Utc::now();
            return report;
        }

        let fetcher = Fetcher::new(self.source.clone(), self.events.clone())
            .with_partitions(self.settings.fetch_partitions);

        let forge = async {
            if !operation.includes_forge() {
                return None;
            }
            Some(self.run_forge(&fetcher).await)
        };
        let mods = async {
            if !operation.includes_mods() {
                return None;
            }
            Some(
                self.install_catalog(
                    catalogs.get(OptionKind::Mod),
                    selections.get(OptionKind::Mod),
                    &fetcher,
                )
                .await,
            )
        };
        let resourcepacks = async {
            if !operation.includes_resourcepacks() {
                return None;
            }
            Some(
                self.install_catalog(
                    catalogs.get(OptionKind::Resourcepack),
                    selections.get(OptionKind::Resourcepack),
                    &fetcher,
                )
                .await,
            )
        };

        let (forge, mods, resourcepacks) = tokio::join!(forge, mods, resourcepacks);
        report.forge = forge;
        report.mods = mods;
        report.resourcepacks = resourcepacks;

        if self.state() != PipelineState::Completed {
            self.set_state(PipelineState::Completed);
        }
        self.emit(InstallEvent::Completed(operation.completion_message().to_string()));
        info!("Finished {:?} (run {})", operation, report.run_id);

        report.state = PipelineState::Completed;
        report.finished_at = Utc::now();
        report
    }

    async fn install_catalog(
        &self,
        catalog: &Catalog,
        selection: &Selection,
        fetcher: &Fetcher,
    ) -> BranchReport {
        let kind = catalog.kind();
        let branch = Branch::from(kind);
        let scratch_dir = branch_scratch_dir(&self.settings.scratch_dir, kind);

        self.advance(branch, PipelineState::Resolving);
        let resolved: Vec<&CatalogOption> = selector::resolve(catalog, |o| selection.is_enabled(o));
        info!("Resolved {} {} options", resolved.len(), kind);

        self.advance(branch, PipelineState::Fetching);
        let artifacts: Vec<_> = resolved.iter().map(|o| o.artifact()).collect();
        let results = fetcher.fetch_all(&artifacts, &scratch_dir).await;

        let mut fetched = Vec::with_capacity(resolved.len());
        let mut fetch_failures = Vec::new();
        for (option, result) in resolved.iter().zip(results) {
            match result.outcome {
                FetchOutcome::Fetched { .. } => fetched.push((*option).clone()),
                FetchOutcome::Failed { error } => fetch_failures.push(FetchFailure {
                    file: option.file.clone(),
                    error,
                }),
            }
        }

        self.advance(branch, PipelineState::Staging);
        let destination = self.settings.destination(kind);
        let hook = match kind {
            OptionKind::Mod => Some(self.hook.as_ref()),
            OptionKind::Resourcepack => None,
        };
        let stager = Stager::new(scratch_dir, self.events.clone());
        let stage = stager.install(&destination, &fetched, hook).await;
        self.advance(branch, PipelineState::Completed);

        BranchReport {
            kind,
            resolved: resolved.iter().map(|o| o.id.clone()).collect(),
            fetch_failures,
            stage,
        }
    }

    async fn run_forge(&self, fetcher: &Fetcher) -> ForgeOutcome {
        self.advance(Branch::Forge, PipelineState::GatingPrereq);
        let outcome = self.gate_and_launch(fetcher).await;
        self.advance(Branch::Forge, PipelineState::Completed);
        outcome
    }

    async fn gate_and_launch(&self, fetcher: &Fetcher) -> ForgeOutcome {
        let installer = ForgeInstaller::new(&self.settings.external_installer_file);
        let ctx = InstallContext {
            minecraft_root: &self.settings.minecraft_root,
            scratch_dir: &self.settings.scratch_dir,
            fetcher,
            runtime_probe: &self.settings.runtime_probe,
            accepted_runtime_prefix: &self.settings.accepted_runtime_prefix,
            runtime_download_link: &self.settings.runtime_download_link,
            open_remediation_link: self.settings.open_remediation_link,
            events: self.events.as_ref(),
        };
        let installer_path = match installer.prepare(&ctx).await {
            Ok(path) => path,
            Err(outcome) => return outcome,
        };

        self.advance(Branch::Forge, PipelineState::RunningExternalInstaller);
        installer.launch(&installer_path, self.events.as_ref()).await
    }
}

/// Scratch folder of one catalog branch. File names are only unique
/// within a catalog, so branches never share a folder.
pub fn branch_scratch_dir(scratch_dir: &Path, kind: OptionKind) -> PathBuf {
    scratch_dir.join(kind.folder_name())
}

/// Wipe and recreate the scratch directory with one folder per catalog.
pub async fn prepare_scratch_dir(scratch_dir: &Path) -> InstallerResult<()> {
    if tokio::fs::try_exists(scratch_dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(scratch_dir)
            .await
            .map_err(|e| InstallerError::io(scratch_dir, e))?;
    }
    for kind in [OptionKind::Mod, OptionKind::Resourcepack] {
        let dir = branch_scratch_dir(scratch_dir, kind);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| InstallerError::io(&dir, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::core::downloader::client::tests::MemorySource;
    use crate::core::java::RuntimeProbe;
    use crate::core::stager::NoopHook;

    const MODS: &str = "\
a:a.jar:A:enabled:dependency=lib
lib:lib.jar:Library:hidden
b:b.jar:B
c:c.jar:C:enabled
";
    const PACKS: &str = "pack:pack.zip:Pack:enabled\n";

    struct Fixture {
        _root: tempfile::TempDir,
        settings: InstallerSettings,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let minecraft_root = root.path().join(".minecraft");
            std::fs::create_dir_all(&minecraft_root).unwrap();
            let settings = InstallerSettings {
                minecraft_root,
                scratch_dir: root.path().join("scratch"),
                open_remediation_link: false,
                runtime_probe: RuntimeProbe {
                    program: "definitely-not-a-real-runtime-binary".into(),
                    args: vec![],
                },
                ..Default::default()
            };
            Self {
                _root: root,
                settings,
            }
        }

        fn mods_dir(&self) -> PathBuf {
            self.settings.destination(OptionKind::Mod)
        }
    }

    fn source(files: &[(&str, &str)]) -> Arc<dyn ArtifactSource> {
        Arc::new(MemorySource::with(files))
    }

    fn listing(dir: &Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn drain(rx: &mut UnboundedReceiver<InstallEvent>) -> Vec<InstallEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn completions(events: &[InstallEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                InstallEvent::Completed(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[derive(Default)]
    struct RecordingHook {
        calls: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PostInstallHook for RecordingHook {
        async fn after_install(&self, option: &CatalogOption, _mods_dir: &Path) -> InstallerResult<()> {
            self.calls.lock().unwrap().push(option.id.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn installs_resolved_mods_and_isolates_missing_artifact() {
        let fixture = Fixture::new();
        std::fs::create_dir_all(fixture.mods_dir()).unwrap();
        std::fs::write(fixture.mods_dir().join("old.jar"), b"stale").unwrap();

        let (sink, mut rx) = EventSink::channel();
        let hook = Arc::new(RecordingHook::default());
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[
                ("mods.txt", MODS),
                ("resourcepacks.txt", PACKS),
                ("a.jar", "a"),
                ("lib.jar", "lib"),
            ]),
            hook.clone(),
            Some(sink),
        );

        let catalogs = orchestrator.load_catalogs().await.unwrap();
        let selections = catalogs.default_selections();
        let report = orchestrator
            .install(Operation::Mods, &catalogs, &selections)
            .await;

        assert_eq!(report.state, PipelineState::Completed);
        assert_eq!(orchestrator.state(), PipelineState::Completed);
        let mods = report.mods.unwrap();
        assert_eq!(mods.resolved, vec!["a", "c", "lib"]);
        assert_eq!(mods.fetch_failures.len(), 1);
        assert_eq!(mods.fetch_failures[0].file, "c.jar");
        assert!(report.resourcepacks.is_none());
        assert!(report.forge.is_none());

        let expected: BTreeSet<String> = ["a.jar", "lib.jar"].iter().map(|s| s.to_string()).collect();
        assert_eq!(listing(&fixture.mods_dir()), expected);
        assert_eq!(*hook.calls.lock().unwrap(), vec!["a", "lib"]);

        let events = drain(&mut rx);
        assert_eq!(completions(&events), vec![Operation::Mods.completion_message()]);
        assert!(matches!(events.last(), Some(InstallEvent::Completed(_))));
    }

    #[tokio::test]
    async fn reinstall_gives_same_destination() {
        let fixture = Fixture::new();
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[
                ("mods.txt", MODS),
                ("resourcepacks.txt", PACKS),
                ("a.jar", "a"),
                ("lib.jar", "lib"),
                ("c.jar", "c"),
                ("pack.zip", "pack"),
            ]),
            Arc::new(NoopHook),
            None,
        );
        let catalogs = orchestrator.load_catalogs().await.unwrap();
        let selections = catalogs.default_selections();

        orchestrator.install(Operation::All, &catalogs, &selections).await;
        let first = listing(&fixture.mods_dir());
        let first_packs = listing(&fixture.settings.destination(OptionKind::Resourcepack));

        orchestrator.install(Operation::All, &catalogs, &selections).await;
        assert_eq!(listing(&fixture.mods_dir()), first);
        assert_eq!(
            listing(&fixture.settings.destination(OptionKind::Resourcepack)),
            first_packs
        );
        assert_eq!(first.len(), 3);
        assert!(first_packs.contains("pack.zip"));
    }

    #[tokio::test]
    async fn both_manifests_unreachable_fails() {
        let fixture = Fixture::new();
        let (sink, mut rx) = EventSink::channel();
        let orchestrator =
            Orchestrator::new(fixture.settings.clone(), source(&[]), Arc::new(NoopHook), Some(sink));

        let err = orchestrator.load_catalogs().await.unwrap_err();
        assert!(matches!(err, InstallerError::CatalogUnavailable(_)));
        assert_eq!(orchestrator.state(), PipelineState::Failed);
        assert!(completions(&drain(&mut rx)).is_empty());
    }

    #[tokio::test]
    async fn one_unreachable_manifest_leaves_empty_catalog() {
        let fixture = Fixture::new();
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[("mods.txt", MODS)]),
            Arc::new(NoopHook),
            None,
        );

        let catalogs = orchestrator.load_catalogs().await.unwrap();
        assert_eq!(catalogs.mods.len(), 4);
        assert!(catalogs.resourcepacks.is_empty());
    }

    #[tokio::test]
    async fn unusable_scratch_dir_fails_before_touching_destination() {
        let mut fixture = Fixture::new();
        let blocker = fixture.settings.scratch_dir.with_file_name("blocker");
        std::fs::write(&blocker, b"a file, not a folder").unwrap();
        fixture.settings.scratch_dir = blocker.join("scratch");
        std::fs::create_dir_all(fixture.mods_dir()).unwrap();
        std::fs::write(fixture.mods_dir().join("old.jar"), b"stale").unwrap();

        let (sink, mut rx) = EventSink::channel();
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[("mods.txt", MODS), ("a.jar", "a")]),
            Arc::new(NoopHook),
            Some(sink),
        );
        let catalogs = orchestrator.load_catalogs().await.unwrap();
        let report = orchestrator
            .install(Operation::Mods, &catalogs, &catalogs.default_selections())
            .await;

        assert_eq!(report.state, PipelineState::Failed);
        assert!(report.failure.is_some());
        assert!(report.mods.is_none());
        assert!(fixture.mods_dir().join("old.jar").exists());
        assert!(completions(&drain(&mut rx)).is_empty());
    }

    #[tokio::test]
    async fn forge_branch_failure_does_not_block_mods() {
        let fixture = Fixture::new();
        let (sink, mut rx) = EventSink::channel();
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[("mods.txt", MODS), ("a.jar", "a"), ("lib.jar", "lib"), ("c.jar", "c")]),
            Arc::new(NoopHook),
            Some(sink),
        );
        let catalogs = orchestrator.load_catalogs().await.unwrap();
        let report = orchestrator
            .install(Operation::ForgeAndMods, &catalogs, &catalogs.default_selections())
            .await;

        // No launcher_profiles.json in the fixture's game directory.
        assert_eq!(report.forge, Some(ForgeOutcome::InvalidGameDirectory));
        assert_eq!(report.mods.unwrap().stage.staged.len(), 3);
        assert_eq!(completions(&drain(&mut rx)), vec![FORGE_AND_MODS_COMPLETED]);
    }

    #[tokio::test]
    async fn wrong_runtime_skips_external_installer() {
        let fixture = Fixture::new();
        std::fs::write(
            fixture.settings.minecraft_root.join("launcher_profiles.json"),
            b"{}",
        )
        .unwrap();
        let (sink, mut rx) = EventSink::channel();
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[("mods.txt", MODS), ("forge.exe", "binary")]),
            Arc::new(NoopHook),
            Some(sink),
        );
        let catalogs = orchestrator.load_catalogs().await.unwrap();
        let report = orchestrator
            .install(Operation::Forge, &catalogs, &catalogs.default_selections())
            .await;

        assert!(matches!(report.forge, Some(ForgeOutcome::RuntimeRejected { .. })));
        assert!(!fixture.settings.scratch_dir.join("forge.exe").exists());

        let events = drain(&mut rx);
        assert!(events.contains(&InstallEvent::Error(
            "You are using the wrong version of Java.".into()
        )));
        assert_eq!(completions(&events).len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn accepted_runtime_runs_external_installer() {
        let mut fixture = Fixture::new();
        std::fs::write(
            fixture.settings.minecraft_root.join("launcher_profiles.json"),
            b"{}",
        )
        .unwrap();
        fixture.settings.runtime_probe = RuntimeProbe {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                r#"printf 'java version "1.8.0_292"\ntwo\nthree\n' >&2"#.into(),
            ],
        };

        let (sink, mut rx) = EventSink::channel();
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[("mods.txt", MODS), ("forge.exe", "#!/bin/sh\nexit 0\n")]),
            Arc::new(NoopHook),
            Some(sink),
        );
        let catalogs = orchestrator.load_catalogs().await.unwrap();
        let report = orchestrator
            .install(Operation::Forge, &catalogs, &catalogs.default_selections())
            .await;

        assert_eq!(report.forge, Some(ForgeOutcome::Exited { code: Some(0) }));
        let events = drain(&mut rx);
        assert!(events.contains(&InstallEvent::StateChanged {
            branch: Branch::Forge,
            state: PipelineState::RunningExternalInstaller,
        }));
    }

    fn state_changes(events: &[InstallEvent]) -> Vec<(Branch, PipelineState)> {
        events
            .iter()
            .filter_map(|e| match e {
                InstallEvent::StateChanged { branch, state } => Some((*branch, *state)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn same_file_name_in_both_catalogs_installs_both() {
        let fixture = Fixture::new();
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[
                ("mods.txt", "m:shared.zip:M:enabled\n"),
                ("resourcepacks.txt", "p:shared.zip:P:enabled\n"),
                ("shared.zip", "shared"),
            ]),
            Arc::new(NoopHook),
            None,
        );
        let catalogs = orchestrator.load_catalogs().await.unwrap();
        let report = orchestrator
            .install(Operation::All, &catalogs, &catalogs.default_selections())
            .await;

        for branch in [report.mods.unwrap(), report.resourcepacks.unwrap()] {
            assert!(branch.fetch_failures.is_empty(), "{:?}", branch.kind);
            assert!(branch.stage.move_failures.is_empty(), "{:?}", branch.kind);
            assert_eq!(branch.stage.staged, vec!["shared.zip"]);
        }
        assert!(fixture.mods_dir().join("shared.zip").is_file());
        assert!(fixture
            .settings
            .destination(OptionKind::Resourcepack)
            .join("shared.zip")
            .is_file());
    }

    #[tokio::test]
    async fn state_changes_never_move_backwards() {
        let fixture = Fixture::new();
        let (sink, mut rx) = EventSink::channel();
        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[
                ("mods.txt", MODS),
                ("resourcepacks.txt", PACKS),
                ("a.jar", "a"),
                ("lib.jar", "lib"),
                ("pack.zip", "pack"),
            ]),
            Arc::new(NoopHook),
            Some(sink),
        );
        let catalogs = orchestrator.load_catalogs().await.unwrap();
        orchestrator
            .install(Operation::All, &catalogs, &catalogs.default_selections())
            .await;

        let changes = state_changes(&drain(&mut rx));
        let mut last: HashMap<Branch, PipelineState> = HashMap::new();
        for &(branch, state) in &changes {
            if let Some(previous) = last.insert(branch, state) {
                assert!(
                    state.rank() > previous.rank(),
                    "{branch:?} went from {previous:?} to {state:?} in {changes:?}"
                );
            }
        }

        let per_branch = |wanted: Branch| -> Vec<PipelineState> {
            changes
                .iter()
                .filter(|(branch, _)| *branch == wanted)
                .map(|&(_, state)| state)
                .collect()
        };
        let staged_branch = vec![
            PipelineState::Resolving,
            PipelineState::Fetching,
            PipelineState::Staging,
            PipelineState::Completed,
        ];
        assert_eq!(per_branch(Branch::Mods), staged_branch);
        assert_eq!(per_branch(Branch::Resourcepacks), staged_branch);
        assert_eq!(
            per_branch(Branch::Forge),
            vec![PipelineState::GatingPrereq, PipelineState::Completed]
        );
        assert_eq!(
            per_branch(Branch::Operation).last(),
            Some(&PipelineState::Completed)
        );
        assert_eq!(orchestrator.state(), PipelineState::Completed);
    }

    #[tokio::test]
    async fn scratch_dir_is_wiped_before_each_operation() {
        let fixture = Fixture::new();
        let mods_scratch = branch_scratch_dir(&fixture.settings.scratch_dir, OptionKind::Mod);
        std::fs::create_dir_all(&mods_scratch).unwrap();
        std::fs::write(fixture.settings.scratch_dir.join("stale.jar"), b"old").unwrap();
        std::fs::write(mods_scratch.join("stale.jar"), b"old").unwrap();

        let orchestrator = Orchestrator::new(
            fixture.settings.clone(),
            source(&[
                ("mods.txt", "a:a.jar:A:enabled\nstale:stale.jar:Stale:enabled\n"),
                ("a.jar", "a"),
            ]),
            Arc::new(NoopHook),
            None,
        );
        let catalogs = orchestrator.load_catalogs().await.unwrap();
        let report = orchestrator
            .install(Operation::Mods, &catalogs, &catalogs.default_selections())
            .await;

        assert!(!fixture.settings.scratch_dir.join("stale.jar").exists());
        assert!(!mods_scratch.join("stale.jar").exists());
        let mods = report.mods.unwrap();
        assert_eq!(mods.fetch_failures.len(), 1);
        assert_eq!(mods.stage.staged, vec!["a.jar"]);
        assert!(!fixture.mods_dir().join("stale.jar").exists());
    }
}
