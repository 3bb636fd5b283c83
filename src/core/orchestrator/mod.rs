pub mod events;
pub mod pipeline;

pub(crate) use events::notify;
pub use events::{EventSink, InstallEvent};
pub use pipeline::{
    Branch, BranchReport, Catalogs, InstallReport, Operation, Orchestrator, PipelineState, Selections,
};
