// ─── Selector ───
// Turns a toggle snapshot into the effective install set: every enabled
// option followed by the hidden libraries their dispersed entries need.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::core::catalog::{Catalog, CatalogOption};

/// Resolve the effective install set for one catalog.
///
/// Enabled options keep catalog order; libraries follow in the order they
/// were first required. Every option appears at most once. A dependency
/// naming no option in the catalog is skipped without error.
pub fn resolve<'a, F>(catalog: &'a Catalog, is_enabled: F) -> Vec<&'a CatalogOption>
where
    F: Fn(&CatalogOption) -> bool,
{
    let enabled: Vec<&CatalogOption> = catalog
        .options()
        .iter()
        .filter(|option| is_enabled(option))
        .collect();

    let mut seen: HashSet<&str> = enabled.iter().map(|option| option.id.as_str()).collect();
    let mut libraries = Vec::new();

    for option in enabled.iter().filter(|option| option.dispersed) {
        let Some(dependency) = option.dependency.as_deref() else {
            continue;
        };

        match catalog.get(dependency) {
            Some(library) => {
                if seen.insert(library.id.as_str()) {
                    debug!("'{}' pulls in library '{}'", option.id, library.id);
                    libraries.push(library);
                }
            }
            None => {
                warn!(
                    "'{}' depends on '{}', which is not in the {} catalog (skipping)",
                    option.id,
                    dependency,
                    catalog.kind()
                );
            }
        }
    }

    let mut resolved = enabled;
    resolved.extend(libraries);
    resolved
}
