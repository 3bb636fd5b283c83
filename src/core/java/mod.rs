pub mod probe;

pub use probe::check_runtime;
pub use probe::evaluate_probe_lines;
pub use probe::remediation_lines;
pub use probe::RuntimeCheck;
pub use probe::RuntimeProbe;
