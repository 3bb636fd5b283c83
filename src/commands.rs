use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::core::catalog::{CatalogOption, OptionKind};
use crate::core::downloader::RemoteSource;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::http::build_http_client;
use crate::core::orchestrator::{
    Catalogs, EventSink, InstallReport, Operation, Orchestrator, Selections,
};
use crate::core::stager::NoopHook;
use crate::core::state::InstallerSettings;

/// One row of `list`.
#[derive(Debug, Serialize)]
pub struct OptionSummary {
    pub kind: OptionKind,
    pub id: String,
    pub display: String,
    pub file: String,
    pub enabled_by_default: bool,
    pub hidden: bool,
    pub dependency: Option<String>,
    pub warning: Option<String>,
    pub description: String,
}

impl From<&CatalogOption> for OptionSummary {
    fn from(option: &CatalogOption) -> Self {
        Self {
            kind: option.kind,
            id: option.id.clone(),
            display: option.display.clone(),
            file: option.file.clone(),
            enabled_by_default: option.enabled,
            hidden: option.hidden,
            dependency: option.dependency.clone(),
            warning: option.warning.clone(),
            description: option.description.clone(),
        }
    }
}

/// A loaded orchestrator together with the session's catalogs.
pub struct Session {
    pub orchestrator: Orchestrator,
    pub catalogs: Catalogs,
}

/// Build the HTTP source and fetch both manifests.
pub async fn open_session(
    settings: InstallerSettings,
    events: Option<EventSink>,
) -> InstallerResult<Session> {
    let client = build_http_client()?;
    let source = Arc::new(RemoteSource::new(client, &settings.remote_base_url));
    let orchestrator = Orchestrator::new(settings, source, Arc::new(NoopHook), events);
    let catalogs = orchestrator.load_catalogs().await?;

    info!(
        "Session ready: {} mods, {} resource packs",
        catalogs.mods.len(),
        catalogs.resourcepacks.len()
    );
    Ok(Session {
        orchestrator,
        catalogs,
    })
}

pub fn list_options(catalogs: &Catalogs, include_hidden: bool) -> Vec<OptionSummary> {
    catalogs
        .mods
        .options()
        .iter()
        .chain(catalogs.resourcepacks.options())
        .filter(|option| include_hidden || !option.hidden)
        .map(OptionSummary::from)
        .collect()
}

/// Start from the manifest defaults and apply the user's toggles. An id
/// is looked up in both catalogs; one that no catalog lets the user toggle
/// is an error.
pub fn build_selections(
    catalogs: &Catalogs,
    enable: &[String],
    disable: &[String],
) -> InstallerResult<Selections> {
    let mut selections = catalogs.default_selections();

    let toggles = enable
        .iter()
        .map(|id| (id, true))
        .chain(disable.iter().map(|id| (id, false)));

    for (id, enabled) in toggles {
        let in_mods = selections.mods.set(&catalogs.mods, id, enabled);
        let in_packs = selections
            .resourcepacks
            .set(&catalogs.resourcepacks, id, enabled);
        if !in_mods && !in_packs {
            return Err(InstallerError::Other(format!(
                "'{id}' is not an option that can be toggled"
            )));
        }
    }

    Ok(selections)
}

pub async fn run_install(
    session: &Session,
    operation: Operation,
    selections: &Selections,
) -> InstallReport {
    session
        .orchestrator
        .install(operation, &session.catalogs, selections)
        .await
}
