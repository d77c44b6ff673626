//! Request body parsing
//!
//! [`parse_body`] turns a raw body into a [`RequestCollection`]. It works in
//! two steps: the body is first parsed as a generic JSON value so arrays
//! (batches) can be told apart from single objects, then every element is
//! classified on its own. A bad element never spoils its siblings; it
//! becomes a [`RequestEntry::Malformed`] that is later answered with
//! Invalid Request.
//!
//! Only two failures apply to the whole body, and both are reported as a
//! single response object rather than an array:
//!
//! - the body is not JSON → Parse error (`-32700`)
//! - the body is `[]` → Invalid Request (`-32600`)
//!
//! # Examples
//!
//! ```rust
//! use schemarpc_core::codec;
//!
//! let collection = codec::parse_body(r#"[
//!     {"jsonrpc":"2.0","method":"user.get","params":{"id":1},"id":1},
//!     {"method":"missing.version","id":2}
//! ]"#).unwrap();
//!
//! assert!(collection.is_batch());
//! assert!(collection.entries()[0].is_well_formed());
//! assert!(!collection.entries()[1].is_well_formed());
//! ```

use crate::error::JsonRpcErrorData;
use crate::types::{Id, RequestCollection, RequestEntry, RequestEnvelope, JSONRPC_VERSION};
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure that applies to the body as a whole
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    /// Body is not valid JSON; carries the parser message
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// Body is an array with no elements
    #[error("empty batch")]
    EmptyBatch,
}

impl ParseFailure {
    /// Wire error for this failure
    pub fn error_data(&self) -> JsonRpcErrorData {
        match self {
            ParseFailure::InvalidJson(detail) => JsonRpcErrorData::parse_error(detail.clone()),
            ParseFailure::EmptyBatch => JsonRpcErrorData::invalid_request(),
        }
    }
}

/// Parse a raw body into ordered request entries
///
/// # Errors
///
/// [`ParseFailure::InvalidJson`] when the body does not parse,
/// [`ParseFailure::EmptyBatch`] when it is an empty array.
pub fn parse_body(body: &str) -> Result<RequestCollection, ParseFailure> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;

    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(ParseFailure::EmptyBatch);
            }
            Ok(RequestCollection::batch(
                items.into_iter().map(classify_entry).collect(),
            ))
        }
        // Scalars and objects alike are a single entry; scalars end up Malformed
        other => Ok(RequestCollection::single(classify_entry(other))),
    }
}

/// Classify one element of a body
///
/// Well-formed means: an object with `jsonrpc == "2.0"`, a non-empty string
/// `method`, and, when present, an `id` that is a string, number or null.
/// `params` may be absent, null, an object or an array.
pub fn classify_entry(value: Value) -> RequestEntry {
    let mut object = match value {
        Value::Object(object) => object,
        other => return malformed(other, Id::Null, "request must be a JSON object"),
    };

    // Salvage the id first so even rejected entries correlate when possible
    let id = match object.get("id").map(Id::from_value) {
        None => None,
        Some(Some(id)) => Some(id),
        Some(None) => {
            return malformed(
                Value::Object(object),
                Id::Null,
                "id must be a string, number or null",
            );
        }
    };
    let response_id = id.clone().unwrap_or(Id::Null);

    if let Err(reason) = check_envelope(&object) {
        return malformed(Value::Object(object), response_id, reason);
    }

    let Some(Value::String(method)) = object.remove("method") else {
        return malformed(Value::Object(object), response_id, "method must be a string");
    };
    let params = match object.remove("params") {
        Some(Value::Null) | None => None,
        Some(params) => Some(params),
    };

    RequestEntry::WellFormed(RequestEnvelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        method,
        params,
        id,
    })
}

fn check_envelope(object: &Map<String, Value>) -> Result<(), &'static str> {
    match object.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        Some(_) => return Err("jsonrpc must be exactly \"2.0\""),
        None => return Err("missing jsonrpc member"),
    }
    match object.get("method") {
        Some(Value::String(method)) if !method.is_empty() => {}
        Some(Value::String(_)) => return Err("method must not be empty"),
        Some(_) => return Err("method must be a string"),
        None => return Err("missing method member"),
    }
    match object.get("params") {
        None | Some(Value::Null) | Some(Value::Object(_)) | Some(Value::Array(_)) => Ok(()),
        Some(_) => Err("params must be an object or array"),
    }
}

fn malformed(raw: Value, id: Id, reason: &str) -> RequestEntry {
    RequestEntry::Malformed {
        raw,
        reason: reason.to_string(),
        id,
    }
}
