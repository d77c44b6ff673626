//! Per-entry dispatch
//!
//! [`RequestDispatcher::dispatch`] runs one well-formed envelope through the
//! pipeline stages in order, stopping at the first one that fails:
//!
//! 1. registry lookup (`-32601`)
//! 2. schema fetch through the cache (`-32601` when the store has no schema)
//! 3. parameter validation (`-32602` with the violations)
//! 4. DTO construction (`-32602` with the reason)
//! 5. command execution (domain errors pass through, anything else is `-32603`)
//!
//! Each stage returns `Result<_, JsonRpcErrorData>` so the flow is plain `?`
//! threading; the response id always comes from the request.

use crate::command::{Command, CommandError, CommandFuture};
use crate::metrics::PipelineMetrics;
use crate::registry::CommandRegistry;
use crate::schema_cache::SchemaCache;
use crate::schema_store::SchemaStoreError;
use crate::validator::{violations_data, ParameterValidator};
use futures::FutureExt;
use schemarpc_core::{JsonRpcErrorData, JsonRpcResponse, RequestEntry, RequestEnvelope};
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs request entries against the registry and schema cache
#[derive(Clone)]
pub struct RequestDispatcher {
    registry: CommandRegistry,
    schemas: Arc<SchemaCache>,
    validator: ParameterValidator,
    handler_timeout: Option<Duration>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("registry", &self.registry)
            .field("schemas", &self.schemas)
            .field("handler_timeout", &self.handler_timeout)
            .finish()
    }
}

impl RequestDispatcher {
    pub fn new(registry: CommandRegistry, schemas: Arc<SchemaCache>) -> Self {
        Self {
            registry,
            schemas,
            validator: ParameterValidator::new(),
            handler_timeout: None,
            metrics: None,
        }
    }

    /// Limit how long a single command may run
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.schemas
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout
    }

    /// Response for any entry; malformed entries never reach a command
    pub async fn dispatch_entry(&self, entry: &RequestEntry) -> JsonRpcResponse {
        match entry {
            RequestEntry::WellFormed(envelope) => self.dispatch(envelope).await,
            RequestEntry::Malformed { reason, id, .. } => {
                tracing::debug!(reason = %reason, id = %id, "Malformed entry");
                let error = JsonRpcErrorData::invalid_request();
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(error.code);
                }
                JsonRpcResponse::error(error, id.clone())
            }
        }
    }

    /// Response for a well-formed envelope
    #[tracing::instrument(skip(self, envelope), fields(method = %envelope.method, id = ?envelope.id))]
    pub async fn dispatch(&self, envelope: &RequestEnvelope) -> JsonRpcResponse {
        let start = Instant::now();
        let outcome = self.run(envelope).await;
        let elapsed = start.elapsed().as_secs_f64();

        let response = match outcome {
            Ok(result) => JsonRpcResponse::success(result, envelope.response_id()),
            Err(error) => JsonRpcResponse::error(error, envelope.response_id()),
        };

        if let Some(metrics) = &self.metrics {
            let status = if response.is_success() { "success" } else { "error" };
            metrics.record_request(&envelope.method, status, elapsed);
            if let Some(error) = response.error_data() {
                metrics.record_error(error.code);
            }
        }

        response
    }

    async fn run(&self, envelope: &RequestEnvelope) -> Result<Value, JsonRpcErrorData> {
        let method = envelope.method.as_str();

        let command = self.registry.get(method).ok_or_else(|| {
            tracing::debug!("No command registered");
            JsonRpcErrorData::method_not_found()
        })?;

        let schema = self
            .schemas
            .get(method)
            .await
            .map_err(|e| schema_failure(method, e))?;

        let violations = self.validator.validate(&schema, envelope.params.as_ref());
        if !violations.is_empty() {
            tracing::debug!(violations = violations.len(), "Params rejected by schema");
            return Err(JsonRpcErrorData::invalid_params(violations_data(&violations)));
        }

        let params = envelope
            .params
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let execution = prepare(command.as_ref(), method, params)?;

        self.execute(method, execution).await
    }

    async fn execute(&self, method: &str, execution: CommandFuture) -> Result<Value, JsonRpcErrorData> {
        let guarded = AssertUnwindSafe(execution).catch_unwind();

        let outcome = match self.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(
                        method,
                        timeout_ms = limit.as_millis() as u64,
                        "Command timed out"
                    );
                    return Err(JsonRpcErrorData::internal_error());
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(CommandError::Domain(error))) => {
                tracing::debug!(code = error.code, "Command returned a domain error");
                Err(error)
            }
            Ok(Err(CommandError::Failure(detail))) => {
                tracing::error!(method, error = %detail, "Command failed");
                Err(JsonRpcErrorData::internal_error())
            }
            Err(payload) => {
                tracing::error!(method, panic = %panic_message(payload.as_ref()), "Command panicked");
                Err(JsonRpcErrorData::internal_error())
            }
        }
    }
}

fn prepare(command: &dyn Command, method: &str, params: Value) -> Result<CommandFuture, JsonRpcErrorData> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| command.prepare(params))) {
        Ok(Ok(execution)) => Ok(execution),
        Ok(Err(e)) => {
            tracing::debug!(reason = %e, "DTO construction failed");
            Err(JsonRpcErrorData::invalid_params_reason(e.reason))
        }
        Err(payload) => {
            tracing::error!(method, panic = %panic_message(payload.as_ref()), "DTO factory panicked");
            Err(JsonRpcErrorData::internal_error())
        }
    }
}

fn schema_failure(method: &str, error: SchemaStoreError) -> JsonRpcErrorData {
    if error.is_not_found() {
        tracing::warn!(method, "Command registered without a schema");
        JsonRpcErrorData::method_not_found()
    } else {
        tracing::error!(method, error = %error, "Schema could not be loaded");
        JsonRpcErrorData::internal_error()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{raw_command, typed_command, CommandResult};
    use crate::schema_store::InMemorySchemaStore;
    use schemarpc_core::Id;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct GetUser {
        id: u64,
    }

    fn dispatcher() -> RequestDispatcher {
        let store = InMemorySchemaStore::new()
            .with_schema(
                "user.get",
                json!({
                    "type": "object",
                    "properties": {"id": {"type": "integer"}},
                    "required": ["id"]
                }),
            )
            .with_schema("system.ping", json!({"type": "object"}))
            .with_schema("system.crash", json!({"type": "object"}))
            .with_schema("system.fail", json!({"type": "object"}))
            .with_schema("system.sleep", json!({"type": "object"}))
            .with_schema("user.loose", json!({}));

        let registry = CommandRegistry::builder()
            .command(
                "user.get",
                typed_command(|dto: GetUser| async move {
                    if dto.id == 404 {
                        return Err(CommandError::invalid_params("User not found"));
                    }
                    CommandResult::Ok(json!({"id": dto.id, "name": "alice"}))
                }),
            )
            .command("user.loose", typed_command(|dto: GetUser| async move { Ok(dto.id) }))
            .command("system.ping", raw_command(|_| async { Ok("pong") }))
            .command(
                "system.crash",
                raw_command(|_| async {
                    if true {
                        panic!("boom");
                    }
                    Ok(json!(null))
                }),
            )
            .command(
                "system.fail",
                raw_command(|_| async { Err::<Value, _>(CommandError::failure("db down")) }),
            )
            .command(
                "system.sleep",
                raw_command(|_| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!("late"))
                }),
            )
            .command("system.unschemed", raw_command(|_| async { Ok(json!(1)) }))
            .build();

        RequestDispatcher::new(registry, Arc::new(SchemaCache::in_memory(Arc::new(store))))
    }

    fn request(method: &str, params: Option<Value>) -> RequestEnvelope {
        RequestEnvelope::new(method, params, Id::from(7i64))
    }

    #[tokio::test]
    async fn test_success() {
        let response = dispatcher()
            .dispatch(&request("user.get", Some(json!({"id": 1}))))
            .await;

        assert_eq!(response.result(), Some(&json!({"id": 1, "name": "alice"})));
        assert_eq!(response.id, Id::from(7i64));
        assert!(response.time.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = dispatcher().dispatch(&request("unknown.method", None)).await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
        assert_eq!(response.id, Id::from(7i64));
    }

    #[tokio::test]
    async fn test_registered_without_schema_is_method_not_found() {
        let response = dispatcher().dispatch(&request("system.unschemed", None)).await;
        assert_eq!(response.error_data().unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_schema_violation() {
        let response = dispatcher()
            .dispatch(&request("user.get", Some(json!({"id": "one"}))))
            .await;

        let error = response.error_data().unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.message, "Invalid params");
        let data = error.data.as_ref().unwrap();
        assert_eq!(data["violations"][0]["path"], json!("/id"));
    }

    #[tokio::test]
    async fn test_missing_params_validated_as_empty_object() {
        let response = dispatcher().dispatch(&request("user.get", None)).await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, -32602);
        assert!(error.data.as_ref().unwrap()["violations"][0]["message"]
            .as_str()
            .unwrap()
            .contains("id"));

        let ping = dispatcher().dispatch(&request("system.ping", None)).await;
        assert_eq!(ping.result(), Some(&json!("pong")));
    }

    #[tokio::test]
    async fn test_dto_construction_failure() {
        // The schema accepts anything, so the typed DTO is the first to object
        let response = dispatcher()
            .dispatch(&request("user.loose", Some(json!({"id": -3}))))
            .await;

        let error = response.error_data().unwrap();
        assert_eq!(error.code, -32602);
        assert!(error.data.as_ref().unwrap()["reason"].is_string());
    }

    #[tokio::test]
    async fn test_domain_error_passes_through() {
        let response = dispatcher()
            .dispatch(&request("user.get", Some(json!({"id": 404}))))
            .await;

        let error = response.error_data().unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.data, Some(json!({"reason": "User not found"})));
        assert_eq!(response.id, Id::from(7i64));
    }

    #[tokio::test]
    async fn test_failure_hides_detail() {
        let response = dispatcher().dispatch(&request("system.fail", None)).await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, -32603);
        assert_eq!(error.message, "Internal error");
        assert!(error.data.is_none());
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let response = dispatcher().dispatch(&request("system.crash", None)).await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, -32603);
        assert!(error.data.is_none());
        assert_eq!(response.id, Id::from(7i64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_internal_error() {
        let dispatcher = dispatcher().with_handler_timeout(Some(Duration::from_millis(50)));
        let response = dispatcher.dispatch(&request("system.sleep", None)).await;
        assert_eq!(response.error_data().unwrap().code, -32603);
    }

    #[tokio::test]
    async fn test_notification_answered_with_null_id() {
        let response = dispatcher()
            .dispatch(&RequestEnvelope::notification("system.ping", None))
            .await;
        assert!(response.is_success());
        assert_eq!(response.id, Id::Null);
    }

    #[tokio::test]
    async fn test_malformed_entry() {
        let entry = RequestEntry::Malformed {
            raw: json!({"jsonrpc": "1.0", "id": "a"}),
            reason: "unsupported jsonrpc version".into(),
            id: Id::from("a"),
        };
        let response = dispatcher().dispatch_entry(&entry).await;
        let error = response.error_data().unwrap();
        assert_eq!(error.code, -32600);
        assert_eq!(error.message, "Invalid Request");
        assert_eq!(response.id, Id::from("a"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(3u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
