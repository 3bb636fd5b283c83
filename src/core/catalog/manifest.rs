// ─── Option Manifests ───
// Parses the line-based `mods.txt` / `resourcepacks.txt` manifests.
//
//   # comment
//   id:file:display[:attribute...]
//
// Attributes are bare flags (`enabled`, `hidden`, `dispersed`) or
// `key=value` pairs (`dependency`, `warning`, `description`, `sha1`).

use std::collections::HashSet;

use tracing::{debug, info};

use super::model::{Catalog, CatalogOption, OptionKind};
use crate::core::downloader::ArtifactSource;
use crate::core::error::{InstallerError, InstallerResult};

/// Parse a whole manifest. Any malformed line rejects the manifest.
pub fn parse_manifest(kind: OptionKind, text: &str) -> InstallerResult<Catalog> {
    let mut options = Vec::new();
    let mut ids = HashSet::new();
    let mut files = HashSet::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let option = parse_line(kind, line).map_err(|message| InstallerError::Manifest {
            line: line_no,
            message,
        })?;

        if !ids.insert(option.id.clone()) {
            return Err(InstallerError::Manifest {
                line: line_no,
                message: format!("duplicate id '{}'", option.id),
            });
        }
        if !files.insert(option.file.clone()) {
            return Err(InstallerError::Manifest {
                line: line_no,
                message: format!("duplicate file '{}'", option.file),
            });
        }

        options.push(option);
    }

    Ok(Catalog::new(kind, options))
}

fn parse_line(kind: OptionKind, line: &str) -> Result<CatalogOption, String> {
    let mut fields = line.split(':').map(str::trim);

    let id = fields.next().unwrap_or_default();
    let file = fields.next().ok_or("missing file field")?;
    let display = fields.next().ok_or("missing display field")?;

    if id.is_empty() {
        return Err("empty id".to_string());
    }
    if file.is_empty() {
        return Err(format!("empty file for '{id}'"));
    }

    let mut option = CatalogOption::new(kind, id, file, display);

    for attribute in fields.filter(|f| !f.is_empty()) {
        match attribute.split_once('=') {
            None => match attribute {
                "enabled" => option.enabled = true,
                "hidden" => option.hidden = true,
                "dispersed" => option.dispersed = true,
                other => debug!("Ignoring unknown flag '{}' on '{}'", other, id),
            },
            Some((key, value)) => {
                let value = value.trim();
                match key.trim() {
                    "dependency" => {
                        option.dispersed = true;
                        option.dependency = Some(value.to_string());
                    }
                    "warning" => {
                        option.caution = true;
                        option.warning = Some(value.to_string());
                    }
                    "description" => option.description = value.to_string(),
                    "sha1" => option.sha1 = Some(value.to_ascii_lowercase()),
                    other => debug!("Ignoring unknown attribute '{}' on '{}'", other, id),
                }
            }
        }
    }

    if option.dispersed && option.dependency.as_deref().map_or(true, str::is_empty) {
        return Err(format!("'{id}' is dispersed but names no dependency"));
    }

    Ok(option)
}

/// Download and parse one manifest from the remote source.
pub async fn fetch_catalog(
    source: &dyn ArtifactSource,
    kind: OptionKind,
) -> InstallerResult<Catalog> {
    let name = kind.manifest_name();
    info!("Fetching {} manifest...", name);

    let text = source.fetch_text(name).await?;
    let catalog = parse_manifest(kind, &text)?;

    info!("Loaded {} {} options", catalog.len(), kind);
    Ok(catalog)
}
