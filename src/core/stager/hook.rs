use std::path::Path;

use async_trait::async_trait;

use crate::core::catalog::CatalogOption;
use crate::core::error::InstallerResult;

/// Runs after a mod has been moved into place, e.g. to write its default
/// configuration. Failures are logged by the stager and never stop the
/// remaining hooks.
#[async_trait]
pub trait PostInstallHook: Send + Sync {
    async fn after_install(&self, option: &CatalogOption, mods_dir: &Path) -> InstallerResult<()>;
}

/// Hook that does nothing; used when no configuration generator is wired in.
pub struct NoopHook;

#[async_trait]
impl PostInstallHook for NoopHook {
    async fn after_install(&self, _option: &CatalogOption, _mods_dir: &Path) -> InstallerResult<()> {
        Ok(())
    }
}
