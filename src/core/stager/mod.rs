pub mod hook;
pub mod stage;

pub use hook::{NoopHook, PostInstallHook};
pub use stage::{StageFailure, StageResult, StageStatus, Stager};
