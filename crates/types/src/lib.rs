// crates/types/src/lib.rs
//! Shared data model for the alphagenome-mcp job manager.
//!
//! The record types here are owned by the job registry and persisted by the
//! database crate; the view types are what the public API hands back to the
//! tool layer.

pub mod job;
pub mod view;

pub use job::{JobId, JobRecord, JobStatus, ParseJobIdError, ParseStatusError, TransitionError};
pub use view::{CancelAck, CancelOutcome, JobLog, JobOutcome, JobStatusView, JobSummary};
