//! Error types for schemarpc
//!
//! Two layers of errors live here:
//!
//! - **Error**: application-level failures raised while configuring or running
//!   the pipeline (uses thiserror)
//! - **JsonRpcErrorData**: the `error` member of a JSON-RPC 2.0 response, i.e.
//!   what actually goes over the wire
//!
//! # Reserved Error Codes
//!
//! | Code | Meaning |
//! |---|---|
//! | `-32700` | Parse error: body is not valid JSON |
//! | `-32600` | Invalid Request: malformed envelope, empty or oversized batch |
//! | `-32601` | Method not found |
//! | `-32602` | Invalid params: schema violation, DTO construction failure |
//! | `-32603` | Internal error: handler failure, panic or timeout |
//! | `-32000..=-32099` | Implementation-defined server errors (domain errors) |
//!
//! # Examples
//!
//! ```rust
//! use schemarpc_core::{JsonRpcErrorData, error::METHOD_NOT_FOUND};
//!
//! let error = JsonRpcErrorData::method_not_found();
//! assert_eq!(error.code, METHOD_NOT_FOUND);
//! assert_eq!(error.message, "Method not found");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body is not valid JSON.
pub const PARSE_ERROR: i32 = -32700;
/// Envelope missing required fields, or empty batch.
pub const INVALID_REQUEST: i32 = -32600;
/// No command registered under the requested method.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Params rejected by the schema, the DTO constructor, or the command itself.
pub const INVALID_PARAMS: i32 = -32602;
/// Uncaught failure inside command execution.
pub const INTERNAL_ERROR: i32 = -32603;
/// Upper bound (inclusive) of the implementation-defined server error range.
pub const SERVER_ERROR_MAX: i32 = -32000;
/// Lower bound (inclusive) of the implementation-defined server error range.
pub const SERVER_ERROR_MIN: i32 = -32099;

/// Result type for schemarpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type
///
/// These never reach the wire directly. The pipeline resolves every failure
/// into a response object; `Error` shows up when building a pipeline, loading
/// configuration, or when a lower layer needs to report why a stage failed.
/// Use [`JsonRpcErrorData::from`] to get the wire form.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A fully formed JSON-RPC error
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Command execution did not finish within the configured timeout
    #[error("Handler timed out after {0} ms")]
    Timeout(u64),

    #[error("Batch size limit exceeded: limit={limit}, actual={actual}")]
    BatchSizeExceeded { limit: usize, actual: usize },

    /// No schema document exists for the method
    #[error("Schema not found for method: {0}")]
    SchemaNotFound(String),

    /// A schema document exists but cannot be used
    #[error("Invalid schema for method {method}: {message}")]
    InvalidSchema { method: String, message: String },
}

impl From<&Error> for JsonRpcErrorData {
    /// Map an application error to its wire form
    ///
    /// Only the code and canonical message are kept for internal failures;
    /// details stay in the logs.
    fn from(err: &Error) -> Self {
        match err {
            Error::JsonRpc(data) => data.clone(),
            Error::InvalidRequest(_) => JsonRpcErrorData::invalid_request(),
            Error::BatchSizeExceeded { limit, actual } => {
                JsonRpcErrorData::batch_size_exceeded(*limit, *actual)
            }
            Error::MethodNotFound(_) | Error::SchemaNotFound(_) => {
                JsonRpcErrorData::method_not_found()
            }
            Error::InvalidParams(reason) => JsonRpcErrorData::invalid_params_reason(reason),
            Error::Serialization(_)
            | Error::Io(_)
            | Error::Internal(_)
            | Error::Timeout(_)
            | Error::InvalidSchema { .. } => JsonRpcErrorData::internal_error(),
        }
    }
}

impl From<Error> for JsonRpcErrorData {
    fn from(err: Error) -> Self {
        JsonRpcErrorData::from(&err)
    }
}

/// JSON-RPC 2.0 error object
///
/// The `error` member of an error response.
///
/// ```json
/// {"code": -32602, "message": "Invalid params", "data": {"violations": []}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Error code, negative integer
    pub code: i32,

    /// Short description of the error
    pub message: String,

    /// Structured detail; omitted from the wire when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// `-32700`, carrying the parser's message as `data`
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::with_data(
            PARSE_ERROR,
            "Parse error",
            serde_json::Value::String(detail.into()),
        )
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    /// `-32602` with arbitrary structured data
    pub fn invalid_params(data: serde_json::Value) -> Self {
        Self::with_data(INVALID_PARAMS, "Invalid params", data)
    }

    /// `-32602` with `{"reason": ...}` as data
    pub fn invalid_params_reason(reason: impl Into<String>) -> Self {
        Self::invalid_params(serde_json::json!({ "reason": reason.into() }))
    }

    /// `-32603`; never carries data so internals do not leak
    pub fn internal_error() -> Self {
        Self::new(INTERNAL_ERROR, "Internal error")
    }

    pub fn batch_size_exceeded(limit: usize, actual: usize) -> Self {
        Self::with_data(
            INVALID_REQUEST,
            "Invalid Request",
            serde_json::json!({ "limit": limit, "actual": actual }),
        )
    }

    /// Build a domain error in the reserved server range
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParams` when `code` lies outside
    /// `-32099..=-32000`.
    pub fn server_error(code: i32, message: impl Into<String>) -> Result<Self> {
        if !is_server_error_code(code) {
            return Err(Error::InvalidParams(format!(
                "server error code {} outside {}..={}",
                code, SERVER_ERROR_MIN, SERVER_ERROR_MAX
            )));
        }
        Ok(Self::new(code, message))
    }

    /// Attach or replace `data`
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// True when `code` is in the implementation-defined server error range
pub fn is_server_error_code(code: i32) -> bool {
    (SERVER_ERROR_MIN..=SERVER_ERROR_MAX).contains(&code)
}

impl std::fmt::Display for JsonRpcErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reserved_codes() {
        let errors = vec![
            (JsonRpcErrorData::parse_error("eof"), PARSE_ERROR, "Parse error"),
            (JsonRpcErrorData::invalid_request(), INVALID_REQUEST, "Invalid Request"),
            (JsonRpcErrorData::method_not_found(), METHOD_NOT_FOUND, "Method not found"),
            (JsonRpcErrorData::invalid_params(json!({})), INVALID_PARAMS, "Invalid params"),
            (JsonRpcErrorData::internal_error(), INTERNAL_ERROR, "Internal error"),
        ];

        for (error, code, message) in errors {
            assert_eq!(error.code, code);
            assert_eq!(error.message, message);
        }
    }

    #[test]
    fn test_parse_error_carries_detail() {
        let error = JsonRpcErrorData::parse_error("expected value at line 1 column 1");
        assert_eq!(
            error.data,
            Some(json!("expected value at line 1 column 1"))
        );
    }

    #[test]
    fn test_internal_error_has_no_data() {
        let error = JsonRpcErrorData::internal_error();
        let serialized = serde_json::to_value(&error).unwrap();
        assert_eq!(serialized, json!({"code": -32603, "message": "Internal error"}));
    }

    #[test]
    fn test_server_error_range() {
        assert!(JsonRpcErrorData::server_error(-32000, "Record not found").is_ok());
        assert!(JsonRpcErrorData::server_error(-32099, "Quota").is_ok());
        assert!(JsonRpcErrorData::server_error(-32100, "Too low").is_err());
        assert!(JsonRpcErrorData::server_error(-31999, "Too high").is_err());
        assert!(JsonRpcErrorData::server_error(INVALID_PARAMS, "Reserved").is_err());
    }

    #[test]
    fn test_batch_size_exceeded() {
        let error = JsonRpcErrorData::batch_size_exceeded(2, 3);
        assert_eq!(error.code, INVALID_REQUEST);
        assert_eq!(error.data, Some(json!({"limit": 2, "actual": 3})));
    }

    #[test]
    fn test_error_mapping_hides_internals() {
        let err = Error::Internal("db password leaked here".to_string());
        let data = JsonRpcErrorData::from(&err);
        assert_eq!(data.code, INTERNAL_ERROR);
        assert!(data.data.is_none());

        let err = Error::InvalidSchema {
            method: "user.get".into(),
            message: "bad type".into(),
        };
        assert_eq!(JsonRpcErrorData::from(err).code, INTERNAL_ERROR);
    }

    #[test]
    fn test_error_mapping_codes() {
        assert_eq!(
            JsonRpcErrorData::from(Error::SchemaNotFound("x".into())).code,
            METHOD_NOT_FOUND
        );
        assert_eq!(
            JsonRpcErrorData::from(Error::MethodNotFound("x".into())).code,
            METHOD_NOT_FOUND
        );
        assert_eq!(JsonRpcErrorData::from(Error::Timeout(50)).code, INTERNAL_ERROR);

        let params = JsonRpcErrorData::from(Error::InvalidParams("age: not a number".into()));
        assert_eq!(params.code, INVALID_PARAMS);
        assert_eq!(params.data, Some(json!({"reason": "age: not a number"})));
    }

    #[test]
    fn test_error_display_formatting() {
        let error = JsonRpcErrorData::method_not_found();
        assert_eq!(error.to_string(), "[-32601] Method not found");

        let error = Error::Timeout(250);
        assert!(error.to_string().contains("250"));
    }

    #[test]
    fn test_error_deserialization() {
        let json = r#"{"code":-32601,"message":"Method not found"}"#;
        let error: JsonRpcErrorData = serde_json::from_str(json).unwrap();

        assert_eq!(error, JsonRpcErrorData::method_not_found());
    }
}
