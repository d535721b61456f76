// crates/server/src/kinds.rs
//! Work functions shipped with the server.
//!
//! `echo` and `batch_echo` exercise the whole job lifecycle (delays, logging,
//! cooperative cancellation) without calling out to the prediction API.

use std::time::Duration;

use alphagenome_mcp_server_jobs::{HandlerTable, JobContext, RegistrationError, WorkError};
use serde::Deserialize;
use serde_json::{json, Value};

fn default_echo_delay() -> u64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct EchoParams {
    #[serde(default)]
    pub value: Value,
    #[serde(default = "default_echo_delay")]
    pub delay_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct BatchEchoParams {
    pub items: Vec<Value>,
    #[serde(default)]
    pub delay_ms: u64,
}

/// Sleep for `ms`, returning early with `Cancelled` if the job is cancelled.
async fn pause(ctx: &JobContext, ms: u64) -> Result<(), WorkError> {
    if ms == 0 {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
        _ = ctx.cancelled() => Err(WorkError::Cancelled),
    }
}

/// Wait `delay_ms`, then return `{"echoed": value}`.
pub async fn echo(ctx: JobContext, params: EchoParams) -> Result<Value, WorkError> {
    ctx.log(format!("echoing {}", params.value)).await;
    pause(&ctx, params.delay_ms).await?;
    Ok(json!({ "echoed": params.value }))
}

/// Echo each item in turn, checking for cancellation before each one.
pub async fn batch_echo(ctx: JobContext, params: BatchEchoParams) -> Result<Value, WorkError> {
    let total = params.items.len();
    let mut echoed = Vec::with_capacity(total);
    for (i, item) in params.items.into_iter().enumerate() {
        ctx.checkpoint()?;
        ctx.log(format!("item {}/{total}: {item}", i + 1)).await;
        pause(&ctx, params.delay_ms).await?;
        echoed.push(item);
    }
    ctx.log(format!("done: {total} items")).await;
    Ok(json!({ "echoed": echoed, "count": total }))
}

/// Handler table with every built-in kind registered.
pub fn builtin_handlers() -> Result<HandlerTable, RegistrationError> {
    let mut table = HandlerTable::new();
    table.register_typed("echo", echo)?;
    table.register_typed("batch_echo", batch_echo)?;
    Ok(table)
}
