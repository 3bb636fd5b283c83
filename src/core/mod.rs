// ─── Skyblock Installer Core ───
// Resolve → fetch → stage pipeline for curated mods and resource packs.
//
// Architecture:
//   core/
//     catalog/      Option records, manifest parser, toggle snapshots
//     selector      Effective install set (enabled + hidden libraries)
//     downloader/   Artifact sources + partitioned concurrent fetcher
//     stager/       Destination replace + post-install hooks
//     java/         Runtime version gate
//     loaders/      External Forge installer branch
//     orchestrator/ Operation state machine, events, reports
//     state/        Persisted settings

pub mod catalog;
pub mod downloader;
pub mod error;
pub mod http;
pub mod java;
pub mod loaders;
pub mod orchestrator;
pub mod selector;
pub mod stager;
pub mod state;
