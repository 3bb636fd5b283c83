pub mod context;
pub mod forge;

pub use context::InstallContext;
pub use forge::{ForgeInstaller, ForgeOutcome};
