mod job;
mod probe;

pub use job::{Job, JobStatus};
pub use probe::{OffsetEstimate, Probe, SYNC_TOLERANCE_TICKS};
