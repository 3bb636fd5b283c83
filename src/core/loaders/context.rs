use std::path::Path;

use crate::core::downloader::Fetcher;
use crate::core::java::RuntimeProbe;
use crate::core::orchestrator::EventSink;

/// Everything the external installer branch needs for one run.
pub struct InstallContext<'a> {
    pub minecraft_root: &'a Path,
    pub scratch_dir: &'a Path,
    pub fetcher: &'a Fetcher,
    pub runtime_probe: &'a RuntimeProbe,
    pub accepted_runtime_prefix: &'a str,
    pub runtime_download_link: &'a str,
    pub open_remediation_link: bool,
    pub events: Option<&'a EventSink>,
}
