//! Commands: the business logic bound to a method name
//!
//! A command is a DTO constructor plus an async handler. Dispatch runs them in
//! two separate steps so their failures stay distinguishable:
//!
//! 1. [`Command::prepare`] builds the typed DTO from validated params. A
//!    failure here is an Invalid params response.
//! 2. The returned [`CommandFuture`] runs the handler. The handler either
//!    returns a result, a deliberate domain error ([`CommandError::Domain`])
//!    which is sent as-is, or an unexpected failure
//!    ([`CommandError::Failure`]) which becomes an Internal error.
//!
//! # Creating Commands
//!
//! - [`typed_command`]: DTO deserialized from params with serde
//! - [`command_with_factory`]: DTO built by an explicit constructor
//! - [`raw_command`]: handler receives the params value itself
//! - `#[command]` (schemarpc-macros): generates a factory from an async fn
//!
//! ```rust
//! use schemarpc_server::{typed_command, CommandError, CommandResult};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct GetUser { id: u64 }
//!
//! #[derive(Serialize)]
//! struct User { id: u64, name: String }
//!
//! let command = typed_command(|dto: GetUser| async move {
//!     if dto.id == 0 {
//!         return Err(CommandError::invalid_params("User not found"));
//!     }
//!     CommandResult::Ok(User { id: dto.id, name: "alice".into() })
//! });
//! ```

use schemarpc_core::JsonRpcErrorData;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Result of a command handler
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Pending execution of a prepared command
pub type CommandFuture = Pin<Box<dyn Future<Output = CommandResult<Value>> + Send>>;

/// Builds a DTO from validated params
pub type DtoFactory<D> = Box<dyn Fn(Value) -> Result<D, DtoError> + Send + Sync>;

/// How a command handler failed
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// Deliberate error response chosen by the command
    #[error("{0}")]
    Domain(JsonRpcErrorData),

    /// Anything the command did not mean to report to the client
    #[error("command failed: {0}")]
    Failure(String),
}

impl CommandError {
    /// Domain error with code `-32602`, e.g. "User not found"
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        CommandError::Domain(JsonRpcErrorData::invalid_params_reason(reason))
    }

    /// Domain error in the `-32000..=-32099` range
    ///
    /// An out-of-range code is a bug in the command and is reported as a
    /// failure instead.
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        match JsonRpcErrorData::server_error(code, message) {
            Ok(error) => CommandError::Domain(error),
            Err(e) => CommandError::Failure(e.to_string()),
        }
    }

    pub fn failure(detail: impl std::fmt::Display) -> Self {
        CommandError::Failure(detail.to_string())
    }
}

impl From<JsonRpcErrorData> for CommandError {
    fn from(error: JsonRpcErrorData) -> Self {
        CommandError::Domain(error)
    }
}

impl From<schemarpc_core::Error> for CommandError {
    fn from(err: schemarpc_core::Error) -> Self {
        match err {
            schemarpc_core::Error::JsonRpc(error) => CommandError::Domain(error),
            other => CommandError::Failure(other.to_string()),
        }
    }
}

/// DTO construction failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct DtoError {
    pub reason: String,
}

impl DtoError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A registered command
pub trait Command: Send + Sync {
    /// Build the DTO from validated params and return the pending execution
    ///
    /// Nothing of the handler runs until the future is polled.
    fn prepare(&self, params: Value) -> Result<CommandFuture, DtoError>;
}

/// DTO constructor plus handler
pub struct CommandDescriptor<D, H> {
    dto_factory: DtoFactory<D>,
    handler: Arc<H>,
}

impl<D, H> CommandDescriptor<D, H> {
    pub fn new<F>(dto_factory: F, handler: H) -> Self
    where
        F: Fn(Value) -> Result<D, DtoError> + Send + Sync + 'static,
    {
        Self {
            dto_factory: Box::new(dto_factory),
            handler: Arc::new(handler),
        }
    }
}

impl<D, H, Fut, R> Command for CommandDescriptor<D, H>
where
    D: Send + 'static,
    H: Fn(D) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    fn prepare(&self, params: Value) -> Result<CommandFuture, DtoError> {
        let dto = (self.dto_factory)(params)?;
        let handler = Arc::clone(&self.handler);

        Ok(Box::pin(async move {
            let result = handler(dto).await?;
            serde_json::to_value(result)
                .map_err(|e| CommandError::Failure(format!("result serialization: {}", e)))
        }))
    }
}

/// Command whose DTO is deserialized from params
pub fn typed_command<D, H, Fut, R>(handler: H) -> Box<dyn Command>
where
    D: DeserializeOwned + Send + 'static,
    H: Fn(D) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    Box::new(CommandDescriptor::new(deserialize_dto::<D>, handler))
}

/// Command with an explicit DTO constructor
pub fn command_with_factory<D, F, H, Fut, R>(dto_factory: F, handler: H) -> Box<dyn Command>
where
    D: Send + 'static,
    F: Fn(Value) -> Result<D, DtoError> + Send + Sync + 'static,
    H: Fn(D) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    Box::new(CommandDescriptor::new(dto_factory, handler))
}

/// Command that works on the params value directly
pub fn raw_command<H, Fut, R>(handler: H) -> Box<dyn Command>
where
    H: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    Box::new(CommandDescriptor::new(Ok, handler))
}

fn deserialize_dto<D: DeserializeOwned>(params: Value) -> Result<D, DtoError> {
    serde_json::from_value(params).map_err(|e| DtoError::new(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct AddParams {
        a: i32,
        b: i32,
    }

    #[derive(Serialize, Deserialize)]
    struct AddResult {
        sum: i32,
    }

    #[tokio::test]
    async fn test_typed_command() {
        let command = typed_command(|params: AddParams| async move {
            Ok(AddResult {
                sum: params.a + params.b,
            })
        });

        let result = command.prepare(json!({"a": 5, "b": 3})).unwrap().await.unwrap();
        let sum: AddResult = serde_json::from_value(result).unwrap();
        assert_eq!(sum.sum, 8);
    }

    #[tokio::test]
    async fn test_dto_failure_happens_before_execution() {
        let command = typed_command(|params: AddParams| async move { Ok(params.a) });

        let err = command.prepare(json!({"a": "five", "b": 3})).err().unwrap();
        assert!(err.reason.contains("invalid type"));
    }

    #[tokio::test]
    async fn test_factory_command() {
        let command = command_with_factory(
            |params: Value| {
                params["email"]
                    .as_str()
                    .filter(|email| email.contains('@'))
                    .map(str::to_lowercase)
                    .ok_or_else(|| DtoError::new("email must contain @"))
            },
            |email: String| async move { Ok(json!({"email": email})) },
        );

        let result = command
            .prepare(json!({"email": "Alice@Example.com"}))
            .unwrap()
            .await
            .unwrap();
        assert_eq!(result, json!({"email": "alice@example.com"}));

        let err = command.prepare(json!({"email": "nope"})).err().unwrap();
        assert_eq!(err, DtoError::new("email must contain @"));
    }

    #[tokio::test]
    async fn test_raw_command_and_domain_error() {
        let command = raw_command(|params: Value| async move {
            match params.get("id").and_then(Value::as_u64) {
                Some(7) => Ok(json!({"id": 7})),
                _ => Err(CommandError::invalid_params("User not found")),
            }
        });

        let found = command.prepare(json!({"id": 7})).unwrap().await.unwrap();
        assert_eq!(found, json!({"id": 7}));

        match command.prepare(json!({"id": 8})).unwrap().await {
            Err(CommandError::Domain(error)) => {
                assert_eq!(error.code, -32602);
                assert_eq!(error.data, Some(json!({"reason": "User not found"})));
            }
            other => panic!("expected domain error, got {:?}", other),
        }
    }

    #[test]
    fn test_server_error_range_enforced() {
        assert!(matches!(
            CommandError::server(-32004, "Record locked"),
            CommandError::Domain(_)
        ));
        assert!(matches!(
            CommandError::server(-1, "bogus"),
            CommandError::Failure(_)
        ));
    }

    #[test]
    fn test_core_error_conversion() {
        let domain: CommandError =
            schemarpc_core::Error::JsonRpc(JsonRpcErrorData::method_not_found()).into();
        assert!(matches!(domain, CommandError::Domain(_)));

        let failure: CommandError = schemarpc_core::Error::Io("disk full".into()).into();
        assert!(matches!(failure, CommandError::Failure(_)));
    }
}
