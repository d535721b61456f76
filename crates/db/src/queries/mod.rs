// crates/db/src/queries/mod.rs
// Job record and job log operations for the SQLite store.

mod jobs;
mod logs;
pub(crate) mod row_types;
