// crates/server-jobs/src/lib.rs
//! Background job manager for long-running analysis calls.
//!
//! A [`JobManager`] accepts submissions of registered job kinds, runs them on
//! a bounded worker pool, records every state change in the job store, and
//! answers status, result, log and list queries without waiting on the work
//! itself. Cancellation is cooperative through [`JobContext`], with a forced
//! stop once the grace period runs out.

mod config;
mod context;
mod error;
mod handler;
mod manager;
pub mod metrics;
mod registry;
mod runner;
mod state;

pub use config::{
    JobManagerConfig, RetentionPolicy, ShutdownMode, DEFAULT_CANCEL_GRACE,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_SWEEP_INTERVAL,
};
pub use context::JobContext;
pub use error::{JobError, JobResult, RegistrationError, WorkError};
pub use handler::{HandlerTable, WorkFn, WorkFuture};
pub use manager::JobManager;
