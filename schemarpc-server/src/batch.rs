//! Batch execution
//!
//! Every entry of a batch is dispatched independently; one entry failing
//! never affects its siblings. Responses always come back in input order,
//! whichever mode is used.
//!
//! # Batch Modes
//!
//! - **Parallel**: one task per entry, joined in input order
//! - **Sequential**: entries awaited one after another, useful when commands
//!   in a batch depend on each other's side effects
//!
//! # Size Limiting
//!
//! With a maximum size configured, an oversized batch is rejected as a whole
//! with one Invalid Request error carrying `{limit, actual}`.
//!
//! # Examples
//!
//! ```rust
//! use schemarpc_server::{BatchMode, BatchProcessor};
//!
//! // Parallel processing with 100-entry limit
//! let processor = BatchProcessor::with_limit(BatchMode::Parallel, Some(100));
//!
//! // Sequential processing, unlimited size
//! let sequential = BatchProcessor::new(BatchMode::Sequential);
//! ```

use crate::dispatcher::{panic_message, RequestDispatcher};
use crate::metrics::PipelineMetrics;
use schemarpc_core::{JsonRpcErrorData, JsonRpcResponse, RequestCollection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// How the entries of a batch are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Process all entries concurrently
    #[default]
    Parallel,

    /// Process entries one at a time, in order
    Sequential,
}

impl BatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::Parallel => "parallel",
            BatchMode::Sequential => "sequential",
        }
    }
}

/// Runs the entries of a request collection
#[derive(Clone, Default)]
pub struct BatchProcessor {
    mode: BatchMode,
    max_size: Option<usize>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("mode", &self.mode)
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl BatchProcessor {
    /// Create a new batch processor with the specified mode
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            max_size: None,
            metrics: None,
        }
    }

    /// Create a new batch processor with mode and max batch size
    pub fn with_limit(mode: BatchMode, max_size: Option<usize>) -> Self {
        Self {
            mode,
            max_size,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// One response per entry, aligned with `collection.entries()`
    ///
    /// # Errors
    ///
    /// The batch-level Invalid Request error when the collection is a batch
    /// larger than the configured maximum. No entry is dispatched then.
    #[tracing::instrument(skip(self, collection, dispatcher), fields(batch_size = collection.len(), is_batch = collection.is_batch(), mode = ?self.mode))]
    pub async fn process(
        &self,
        collection: &RequestCollection,
        dispatcher: &RequestDispatcher,
    ) -> Result<Vec<JsonRpcResponse>, JsonRpcErrorData> {
        if !collection.is_batch() {
            let mut responses = Vec::with_capacity(1);
            for entry in collection.entries() {
                responses.push(dispatcher.dispatch_entry(entry).await);
            }
            return Ok(responses);
        }

        if let Some(max_size) = self.max_size {
            if collection.len() > max_size {
                tracing::warn!(
                    batch_size = collection.len(),
                    max_size = max_size,
                    "Batch size exceeded"
                );
                return Err(JsonRpcErrorData::batch_size_exceeded(
                    max_size,
                    collection.len(),
                ));
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_batch(collection.len() as u64, self.mode.as_str());
        }

        let responses = match self.mode {
            BatchMode::Parallel => self.process_parallel(collection, dispatcher).await,
            BatchMode::Sequential => self.process_sequential(collection, dispatcher).await,
        };

        tracing::debug!(response_count = responses.len(), "Batch processing completed");
        Ok(responses)
    }

    async fn process_parallel(
        &self,
        collection: &RequestCollection,
        dispatcher: &RequestDispatcher,
    ) -> Vec<JsonRpcResponse> {
        // Dropping the set aborts whatever is still running
        let mut tasks = JoinSet::new();
        let mut slots = HashMap::with_capacity(collection.len());
        for (index, entry) in collection.entries().iter().enumerate() {
            let entry = entry.clone();
            let dispatcher = dispatcher.clone();
            let handle = tasks.spawn(async move { dispatcher.dispatch_entry(&entry).await });
            slots.insert(handle.id(), index);
        }

        // Placed by input position, so completion order never leaks into the output
        let mut responses: Vec<Option<JsonRpcResponse>> =
            (0..collection.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, response)) => {
                    if let Some(&index) = slots.get(&id) {
                        responses[index] = Some(response);
                    }
                }
                Err(e) => {
                    let detail = if e.is_panic() {
                        panic_message(e.into_panic().as_ref())
                    } else {
                        e.to_string()
                    };
                    tracing::error!(error = %detail, "Batch entry task failed");
                }
            }
        }

        responses
            .into_iter()
            .zip(collection.entries())
            .map(|(response, entry)| {
                response.unwrap_or_else(|| {
                    JsonRpcResponse::error(JsonRpcErrorData::internal_error(), entry.response_id())
                })
            })
            .collect()
    }

    async fn process_sequential(
        &self,
        collection: &RequestCollection,
        dispatcher: &RequestDispatcher,
    ) -> Vec<JsonRpcResponse> {
        let mut responses = Vec::with_capacity(collection.len());

        for entry in collection.entries() {
            responses.push(dispatcher.dispatch_entry(entry).await);
        }

        responses
    }
}
