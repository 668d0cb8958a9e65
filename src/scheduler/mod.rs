//! Job admission and the bounded worker pool.
//!
//! Submissions pass [`AdmissionQueue`] checks, then [`WorkerPool`] spawns a
//! worker per accepted job. A worker holds a permit while it benchmarks,
//! rates and stores the job, then clears the participant's marker.

pub mod job;
pub mod pool;
pub mod queue;

pub use job::{JobState, JobTicket, ScoringJob};
pub use pool::WorkerPool;
pub use queue::{validate_endpoint, AdmissionQueue, InFlightGuard};
