pub mod manifest;
pub mod model;
pub mod selection;

pub use manifest::{fetch_catalog, parse_manifest};
pub use model::{Artifact, Catalog, CatalogOption, OptionKind};
pub use selection::Selection;
