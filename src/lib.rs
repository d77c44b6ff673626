//! schemarpc - schema-validated JSON-RPC 2.0 processing
//!
//! This is the main convenience crate that re-exports the schemarpc
//! sub-crates. Use it when you want a single dependency for the whole
//! pipeline.
//!
//! # Architecture
//!
//! schemarpc is organized into modular crates:
//!
//! - **schemarpc-core**: wire types, body codec, error taxonomy, observability
//! - **schemarpc-server**: schema store and cache, command registry, dispatch,
//!   batching, response assembly
//! - **schemarpc-macros**: the `#[command]` attribute
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use schemarpc::{command, CommandResult, RpcPipeline};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i64, b: i64 }
//!
//! #[command]
//! async fn add(p: AddParams) -> CommandResult<i64> {
//!     Ok(p.a + p.b)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // ./schemas/math.add.json holds the params schema
//!     let pipeline = RpcPipeline::builder()
//!         .schema_root("./schemas")
//!         .command("math.add", add())
//!         .build()?;
//!
//!     let body = r#"{"jsonrpc":"2.0","method":"math.add","params":{"a":5,"b":3},"id":1}"#;
//!     println!("{}", pipeline.process_to_string(body).await);
//!     Ok(())
//! }
//! ```
//!
//! Code generated by `#[command]` refers to `schemarpc_server` by name, so
//! crates using the macro depend on `schemarpc-server` directly as well.

pub use schemarpc_core as core;
pub use schemarpc_macros as macros;
pub use schemarpc_server as server;

pub use schemarpc_core::{Error, Id, JsonRpcErrorData, JsonRpcResponse, PipelineOutput, Result};
pub use schemarpc_macros::command;
pub use schemarpc_server::{
    command_with_factory, raw_command, typed_command, BatchMode, CommandError, CommandResult,
    DtoError, FsSchemaStore, InMemorySchemaStore, PipelineConfig, RpcPipeline,
};
