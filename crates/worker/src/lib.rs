//! Job execution: the single-flight path from a generation request to a
//! persisted [`zimage_core::job::JobRecord`].

pub mod executor;

pub use executor::{ExecutorError, JobExecutor};
