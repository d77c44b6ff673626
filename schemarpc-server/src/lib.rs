//! Schema-validated JSON-RPC 2.0 request processing
//!
//! This crate turns a raw request body into a complete JSON-RPC output value.
//! Transport is left to the caller: hand [`RpcPipeline::process`] the body
//! and write back what it returns.
//!
//! # Core Features
//!
//! - **Command Registry**: statically built mapping from method names to commands
//! - **Schema Validation**: per-method JSON Schema for `params`, all violations reported
//! - **Schema Cache**: read-through, keyed by project and method, with a TTL
//! - **Batch Processing**: parallel or sequential, responses always in input order
//! - **Failure Isolation**: panics, failures and timeouts become per-entry errors
//! - **Observability**: `tracing` spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust
//! use schemarpc_server::{typed_command, CommandResult, InMemorySchemaStore, RpcPipeline};
//! use serde::Deserialize;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i64, b: i64 }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> schemarpc_core::Result<()> {
//! let schemas = InMemorySchemaStore::new().with_schema("math.add", json!({
//!     "type": "object",
//!     "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
//!     "required": ["a", "b"]
//! }));
//!
//! let pipeline = RpcPipeline::builder()
//!     .schema_store(Arc::new(schemas))
//!     .command("math.add", typed_command(|p: AddParams| async move {
//!         CommandResult::Ok(p.a + p.b)
//!     }))
//!     .build()?;
//!
//! let output = pipeline
//!     .process(r#"{"jsonrpc":"2.0","method":"math.add","params":{"a":2,"b":3},"id":1}"#)
//!     .await;
//! assert_eq!(output.to_value()["result"], json!(5));
//! # Ok(())
//! # }
//! ```
//!
//! # Pipeline
//!
//! raw body → [`codec::parse_body`](schemarpc_core::codec::parse_body) →
//! [`BatchProcessor`] → [`RequestDispatcher`] per entry (registry lookup,
//! [`SchemaCache`], [`ParameterValidator`], DTO, command) →
//! [`ResponseAssembler`] → [`PipelineOutput`].
//!
//! Nothing in the pipeline returns an error to the caller; every failure is
//! expressed as a JSON-RPC error object in the output.

mod assembler;
mod batch;
mod builder;
mod command;
mod config;
mod dispatcher;
mod metrics;
mod registry;
mod schema_cache;
mod schema_store;
mod validator;

pub use assembler::ResponseAssembler;
pub use batch::{BatchMode, BatchProcessor};
pub use builder::PipelineBuilder;
pub use command::{
    command_with_factory, raw_command, typed_command, Command, CommandDescriptor, CommandError,
    CommandFuture, CommandResult, DtoError, DtoFactory,
};
pub use config::{
    BatchConfig, PipelineConfig, ENV_BATCH_MODE, ENV_CACHE_ENABLED, ENV_CACHE_PROJECT,
    ENV_CACHE_TTL_SECS, ENV_HANDLER_TIMEOUT_MS, ENV_MAX_BATCH_SIZE, ENV_SCHEMA_ROOT,
};
pub use dispatcher::RequestDispatcher;
pub use metrics::PipelineMetrics;
pub use registry::{CommandRegistry, CommandRegistryBuilder};
pub use schema_cache::{
    CacheBackend, CacheKey, InMemoryCacheBackend, NoopCacheBackend, SchemaCache,
    SchemaCacheConfig, SchemaCacheEntry, DEFAULT_CACHE_TTL_SECS,
};
pub use schema_store::{
    FsSchemaStore, InMemorySchemaStore, ParsedSchema, SchemaStore, SchemaStoreError,
};
pub use validator::{violations_data, ParameterValidator, Violation};

use schemarpc_core::{codec, PipelineOutput};
use std::sync::Arc;

/// Schema-validated JSON-RPC processing pipeline
///
/// Cheap to clone; clones share the registry and schema cache.
#[derive(Debug, Clone)]
pub struct RpcPipeline {
    pub(crate) dispatcher: RequestDispatcher,
    pub(crate) batch: BatchProcessor,
    pub(crate) assembler: ResponseAssembler,
}

impl RpcPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Process one raw request body
    ///
    /// Always produces a valid JSON-RPC output: a single object for a single
    /// request or a top-level failure, an array aligned with the input for a
    /// batch.
    #[tracing::instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn process(&self, body: &str) -> PipelineOutput {
        let collection = match codec::parse_body(body) {
            Ok(collection) => collection,
            Err(failure) => {
                tracing::debug!(error = %failure, "Body rejected before dispatch");
                return self.assembler.failure(failure.error_data());
            }
        };

        match self.batch.process(&collection, &self.dispatcher).await {
            Ok(responses) => self.assembler.assemble(&collection, responses),
            Err(error) => self.assembler.failure(error),
        }
    }

    /// Process one raw request body and encode the output
    pub async fn process_to_string(&self, body: &str) -> String {
        self.process(body).await.to_json()
    }

    pub fn registry(&self) -> &CommandRegistry {
        self.dispatcher.registry()
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        self.dispatcher.schema_cache()
    }

    pub fn batch_mode(&self) -> BatchMode {
        self.batch.mode()
    }
}
