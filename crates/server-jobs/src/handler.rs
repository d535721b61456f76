// crates/server-jobs/src/handler.rs
//! Table of work functions keyed by job kind.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::JobContext;
use crate::error::{RegistrationError, WorkError};

pub type WorkFuture = Pin<Box<dyn Future<Output = Result<Value, WorkError>> + Send>>;

/// A registered work function: receives the job's context and parameters,
/// resolves to the job's result.
pub type WorkFn = Arc<dyn Fn(JobContext, Value) -> WorkFuture + Send + Sync>;

/// Maps each job kind to its work function.
///
/// Built before the manager starts and read-only afterwards.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, WorkFn>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a work function taking raw JSON parameters.
    pub fn register<F, Fut>(&mut self, kind: &str, work: F) -> Result<(), RegistrationError>
    where
        F: Fn(JobContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, WorkError>> + Send + 'static,
    {
        if kind.trim().is_empty() {
            return Err(RegistrationError::EmptyKind);
        }
        if self.handlers.contains_key(kind) {
            return Err(RegistrationError::Duplicate(kind.to_string()));
        }
        let boxed: WorkFn = Arc::new(move |ctx, params| -> WorkFuture { Box::pin(work(ctx, params)) });
        self.handlers.insert(kind.to_string(), boxed);
        Ok(())
    }

    /// Register a work function with typed parameters and result.
    ///
    /// Parameters that fail to deserialize fail the job without calling `work`.
    pub fn register_typed<P, R, F, Fut>(
        &mut self,
        kind: &str,
        work: F,
    ) -> Result<(), RegistrationError>
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(JobContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, WorkError>> + Send + 'static,
    {
        let kind_name = kind.to_string();
        self.register(kind, move |ctx, params| {
            let call = match serde_json::from_value::<P>(params) {
                Ok(params) => Ok(work(ctx, params)),
                Err(e) => Err(WorkError::msg(format!(
                    "invalid parameters for kind '{kind_name}': {e}"
                ))),
            };
            async move {
                let output = call?.await?;
                serde_json::to_value(output)
                    .map_err(|e| WorkError::msg(format!("result is not serializable: {e}")))
            }
        })
    }

    pub fn get(&self, kind: &str) -> Option<WorkFn> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicates_and_empty_kind() {
        let mut table = HandlerTable::new();
        table
            .register("echo", |_ctx, params| async move { Ok(params) })
            .unwrap();

        let dup = table.register("echo", |_ctx, params| async move { Ok(params) });
        assert_eq!(dup, Err(RegistrationError::Duplicate("echo".into())));

        let empty = table.register("  ", |_ctx, params| async move { Ok(params) });
        assert_eq!(empty, Err(RegistrationError::EmptyKind));

        assert_eq!(table.len(), 1);
        assert!(table.contains("echo"));
        assert!(table.get("missing").is_none());
    }

    #[test]
    fn test_kinds_sorted() {
        let mut table = HandlerTable::new();
        for kind in ["score_variant", "batch_echo", "echo"] {
            table
                .register(kind, |_ctx, params| async move { Ok(params) })
                .unwrap();
        }
        assert_eq!(table.kinds(), vec!["batch_echo", "echo", "score_variant"]);
    }
}
