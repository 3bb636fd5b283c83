use std::collections::HashSet;

use tracing::warn;

use super::model::{Catalog, CatalogOption};

/// Immutable snapshot of the user's toggles, taken when an install starts.
///
/// Front-ends mutate their own toggle state freely; the pipeline only ever
/// reads a `Selection`, so no toggle can change mid-install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    enabled: HashSet<String>,
}

impl Selection {
    /// The manifest's default toggles.
    pub fn defaults(catalog: &Catalog) -> Self {
        Self {
            enabled: catalog
                .options()
                .iter()
                .filter(|option| option.enabled)
                .map(|option| option.id.clone())
                .collect(),
        }
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Toggle a visible option. Hidden and unknown ids are refused, since
    /// those are only reachable through dependency resolution.
    pub fn set(&mut self, catalog: &Catalog, id: &str, enabled: bool) -> bool {
        match catalog.get(id) {
            Some(option) if !option.hidden => {
                if enabled {
                    self.enabled.insert(id.to_string());
                } else {
                    self.enabled.remove(id);
                }
                true
            }
            Some(_) => {
                warn!("Option '{}' is hidden and cannot be toggled", id);
                false
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, option: &CatalogOption) -> bool {
        self.enabled.contains(&option.id)
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}
