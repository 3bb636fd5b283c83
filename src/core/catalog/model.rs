use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which catalog an option belongs to. Mods and resource packs are
/// installed by independent pipelines into different folders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Mod,
    Resourcepack,
}

impl OptionKind {
    /// Remote manifest listing this kind of option.
    pub fn manifest_name(self) -> &'static str {
        match self {
            OptionKind::Mod => "mods.txt",
            OptionKind::Resourcepack => "resourcepacks.txt",
        }
    }

    /// Folder name under the install root.
    pub fn folder_name(self) -> &'static str {
        match self {
            OptionKind::Mod => "mods",
            OptionKind::Resourcepack => "resourcepacks",
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionKind::Mod => f.pad("mod"),
            OptionKind::Resourcepack => f.pad("resourcepack"),
        }
    }
}

/// A single installable entry from a remote manifest.
///
/// `enabled` is only the manifest's default; the live toggle state is a
/// [`Selection`](super::Selection) snapshot taken when an install starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogOption {
    pub kind: OptionKind,
    pub id: String,
    pub display: String,
    /// Artifact file name, relative to both the remote base and the
    /// destination folder.
    pub file: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub hidden: bool,
    pub dispersed: bool,
    /// Library option required by a dispersed option.
    pub dependency: Option<String>,
    pub caution: bool,
    pub warning: Option<String>,
    pub sha1: Option<String>,
}

impl CatalogOption {
    pub fn new(kind: OptionKind, id: &str, file: &str, display: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
            display: display.to_string(),
            file: file.to_string(),
            description: String::new(),
            enabled: false,
            hidden: false,
            dispersed: false,
            dependency: None,
            caution: false,
            warning: None,
            sha1: None,
        }
    }

    /// The artifact this option downloads.
    pub fn artifact(&self) -> Artifact {
        Artifact {
            file: self.file.clone(),
            display: self.display.clone(),
            sha1: self.sha1.clone(),
        }
    }
}

/// What the fetcher needs to know about a download.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub file: String,
    pub display: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl Artifact {
    pub fn new(file: &str, display: &str) -> Self {
        Self {
            file: file.to_string(),
            display: display.to_string(),
            sha1: None,
        }
    }
}

/// Ordered list of options of one kind plus an `id -> index` lookup built
/// once at load time.
#[derive(Debug, Clone)]
pub struct Catalog {
    kind: OptionKind,
    options: Vec<CatalogOption>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, keeping insertion order. When an id repeats, the
    /// lookup resolves to its first occurrence.
    pub fn new(kind: OptionKind, options: Vec<CatalogOption>) -> Self {
        let mut by_id = HashMap::with_capacity(options.len());
        for (index, option) in options.iter().enumerate() {
            by_id.entry(option.id.clone()).or_insert(index);
        }
        Self {
            kind,
            options,
            by_id,
        }
    }

    pub fn empty(kind: OptionKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn options(&self) -> &[CatalogOption] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogOption> {
        self.by_id.get(id).map(|&index| &self.options[index])
    }

    /// Options a user may toggle.
    pub fn visible(&self) -> impl Iterator<Item = &CatalogOption> {
        self.options.iter().filter(|option| !option.hidden)
    }

    /// Dependencies that point at no option in this catalog. The selector
    /// skips these silently, so they are surfaced here for validation.
    pub fn dangling_dependencies(&self) -> Vec<(&str, &str)> {
        self.options
            .iter()
            .filter(|option| option.dispersed)
            .filter_map(|option| {
                let dependency = option.dependency.as_deref()?;
                if self.by_id.contains_key(dependency) {
                    None
                } else {
                    Some((option.id.as_str(), dependency))
                }
            })
            .collect()
    }
}
