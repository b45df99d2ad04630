mod errors;
mod events;
mod orchestrator;
mod scheduler;
mod tasks;

pub use errors::MonitorError;
pub use events::{CycleOutcome, CycleReport, MonitorEvent, MonitorSnapshot};
pub use orchestrator::{Monitor, MonitorBuilder};
