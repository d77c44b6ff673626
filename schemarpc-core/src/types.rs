//! JSON-RPC 2.0 envelope and response types
//!
//! Inbound bodies are turned into a [`RequestCollection`]: an ordered list of
//! [`RequestEntry`] values plus a flag recording whether the body was a batch.
//! Each entry is either a well-formed [`RequestEnvelope`] or a malformed value
//! that still gets its own Invalid Request response.
//!
//! Outbound, every entry produces exactly one [`JsonRpcResponse`]. Responses
//! carry a `time` member (ISO-8601 with offset) stamped at assembly.
//! [`PipelineOutput`] is the final value: a single object for a single
//! request, an array for a batch.
//!
//! # Request IDs
//!
//! IDs correlate requests with responses. Strings, numbers and null are all
//! accepted; an entry whose id cannot be read is answered with `null`.

use crate::error::JsonRpcErrorData;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Protocol version accepted and emitted by the pipeline
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request ID
///
/// Serialized untagged, so it appears on the wire exactly as the client sent
/// it. Numbers keep their JSON representation (integers and fractions both
/// round-trip).
///
/// ```rust
/// use schemarpc_core::Id;
///
/// let id: Id = "req-123".into();
/// assert_eq!(id.to_string(), "\"req-123\"");
///
/// let id: Id = 42i64.into();
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(serde_json::Number),
    Null,
}

impl Id {
    /// Read an id out of a raw JSON value
    ///
    /// Returns `None` for arrays, objects and booleans, which are not valid
    /// ids.
    pub fn from_value(value: &Value) -> Option<Id> {
        match value {
            Value::String(s) => Some(Id::String(s.clone())),
            Value::Number(n) => Some(Id::Number(n.clone())),
            Value::Null => Some(Id::Null),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Id::Null)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n.into())
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Id::Number(n.into())
    }
}

/// A well-formed JSON-RPC 2.0 request
///
/// `id` is `None` when the member was absent (notification semantics). The
/// pipeline still answers such entries, with a `null` id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

impl RequestEnvelope {
    /// Create a request with an id
    ///
    /// ```rust
    /// use schemarpc_core::{Id, RequestEnvelope};
    ///
    /// let request = RequestEnvelope::new("user.get", None, Id::from(1i64));
    /// assert_eq!(request.jsonrpc, "2.0");
    /// assert!(!request.is_notification());
    /// ```
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// Create a request without an id
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Id to put on the response: the request id, or null when absent
    pub fn response_id(&self) -> Id {
        self.id.clone().unwrap_or(Id::Null)
    }
}

/// One element of a request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEntry {
    WellFormed(RequestEnvelope),
    /// The value failed envelope checks. `id` is the value's own id when it
    /// could be read, null otherwise.
    Malformed { raw: Value, reason: String, id: Id },
}

impl RequestEntry {
    pub fn response_id(&self) -> Id {
        match self {
            RequestEntry::WellFormed(envelope) => envelope.response_id(),
            RequestEntry::Malformed { id, .. } => id.clone(),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        matches!(self, RequestEntry::WellFormed(_))
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            RequestEntry::WellFormed(envelope) => Some(envelope.method.as_str()),
            RequestEntry::Malformed { .. } => None,
        }
    }
}

/// Ordered entries of one inbound body
///
/// A non-batch collection always holds exactly one entry; the constructors
/// are the only way to build one.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestCollection {
    entries: Vec<RequestEntry>,
    is_batch: bool,
}

impl RequestCollection {
    pub fn single(entry: RequestEntry) -> Self {
        Self {
            entries: vec![entry],
            is_batch: false,
        }
    }

    pub fn batch(entries: Vec<RequestEntry>) -> Self {
        Self {
            entries,
            is_batch: true,
        }
    }

    pub fn is_batch(&self) -> bool {
        self.is_batch
    }

    pub fn entries(&self) -> &[RequestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<RequestEntry> {
        self.entries
    }
}

/// Success or error half of a response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Success(Value),
    Error(JsonRpcErrorData),
}

/// JSON-RPC 2.0 response
///
/// Serializes as
/// `{"jsonrpc":"2.0","result":...,"id":...,"time":"..."}` or
/// `{"jsonrpc":"2.0","error":{...},"id":...,"time":"..."}`. `time` is only
/// emitted once the response has been stamped.
///
/// ```rust
/// use schemarpc_core::{Id, JsonRpcErrorData, JsonRpcResponse};
/// use serde_json::json;
///
/// let ok = JsonRpcResponse::success(json!({"name": "alice"}), Id::from(1i64));
/// assert!(ok.is_success());
///
/// let err = JsonRpcResponse::error(JsonRpcErrorData::method_not_found(), Id::Null);
/// assert!(err.is_error());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    pub outcome: ResponseOutcome,
    pub id: Id,
    pub time: Option<DateTime<Utc>>,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: Id) -> Self {
        Self {
            outcome: ResponseOutcome::Success(result),
            id,
            time: None,
        }
    }

    pub fn error(error: JsonRpcErrorData, id: Id) -> Self {
        Self {
            outcome: ResponseOutcome::Error(error),
            id,
            time: None,
        }
    }

    /// Replace the id, keeping the outcome
    pub fn with_id(mut self, id: Id) -> Self {
        self.id = id;
        self
    }

    /// Set the construction timestamp
    pub fn stamp(&mut self, at: DateTime<Utc>) {
        self.time = Some(at);
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Error(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Success(value) => Some(value),
            ResponseOutcome::Error(_) => None,
        }
    }

    pub fn error_data(&self) -> Option<&JsonRpcErrorData> {
        match &self.outcome {
            ResponseOutcome::Success(_) => None,
            ResponseOutcome::Error(error) => Some(error),
        }
    }

    /// Timestamp as written on the wire
    pub fn time_string(&self) -> Option<String> {
        self.time
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, false))
    }
}

impl Serialize for JsonRpcResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.time.is_some() { 4 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
        match &self.outcome {
            ResponseOutcome::Success(result) => map.serialize_entry("result", result)?,
            ResponseOutcome::Error(error) => map.serialize_entry("error", error)?,
        }
        map.serialize_entry("id", &self.id)?;
        if let Some(time) = self.time_string() {
            map.serialize_entry("time", &time)?;
        }
        map.end()
    }
}

/// Final value produced for one inbound body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineOutput {
    /// Single request, or a top-level failure (parse error, empty batch)
    Single(JsonRpcResponse),
    /// One response per batch entry, in input order
    Batch(Vec<JsonRpcResponse>),
}

impl PipelineOutput {
    pub fn is_batch(&self) -> bool {
        matches!(self, PipelineOutput::Batch(_))
    }

    /// All responses, in order
    pub fn responses(&self) -> &[JsonRpcResponse] {
        match self {
            PipelineOutput::Single(response) => std::slice::from_ref(response),
            PipelineOutput::Batch(responses) => responses,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| internal_error_value())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| internal_error_value().to_string())
    }
}

// Results are already `Value`s, so serialization cannot fail in practice;
// this keeps the "always valid JSON-RPC output" contract if it ever does.
fn internal_error_value() -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "error": JsonRpcErrorData::internal_error(),
        "id": Value::Null,
    })
}
