//! Core JSON-RPC 2.0 types and codec for schemarpc
//!
//! This crate holds everything about the protocol itself, independent of how
//! requests are dispatched:
//!
//! - **Types**: envelopes, request entries and collections, responses
//! - **Codec**: raw body → ordered request entries; output encoding
//! - **Error handling**: the application error enum and the wire error object
//! - **Observability**: `tracing` subscriber and OpenTelemetry setup
//!
//! # Example
//!
//! ```rust
//! use schemarpc_core::{codec, RequestEntry};
//!
//! let collection = codec::parse_body(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
//! assert!(!collection.is_batch());
//! assert!(matches!(collection.entries()[0], RequestEntry::WellFormed(_)));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use codec::ParseFailure;
pub use error::{Error, JsonRpcErrorData, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    Id, JsonRpcResponse, PipelineOutput, RequestCollection, RequestEntry, RequestEnvelope,
    ResponseOutcome, JSONRPC_VERSION,
};
