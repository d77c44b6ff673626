//! Feed a request body from stdin through the pipeline
//!
//! ```text
//! echo '{"jsonrpc":"2.0","method":"math.add","params":{"a":2,"b":3},"id":1}' \
//!     | cargo run --example stdin_pipeline
//! ```
//!
//! Schemas come from `SCHEMARPC_SCHEMA_ROOT` when it is set, otherwise the
//! built-in ones below are used. Logs go to stderr, the response to stdout.

use schemarpc::core::{init_observability, shutdown_observability, ObservabilityConfig};
use schemarpc::{command, CommandError, CommandResult, InMemorySchemaStore, PipelineConfig, RpcPipeline};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Read;
use std::sync::Arc;

#[derive(Deserialize)]
struct AddParams {
    a: i64,
    b: i64,
}

#[derive(Deserialize)]
struct GetUser {
    id: u64,
}

#[derive(Serialize)]
struct User {
    id: u64,
    name: &'static str,
}

#[command]
async fn add(params: AddParams) -> CommandResult<i64> {
    params
        .a
        .checked_add(params.b)
        .ok_or_else(|| CommandError::invalid_params("Sum overflows"))
}

#[command]
async fn user_get(dto: GetUser) -> CommandResult<User> {
    match dto.id {
        1 => Ok(User { id: 1, name: "alice" }),
        2 => Ok(User { id: 2, name: "bob" }),
        _ => Err(CommandError::invalid_params("User not found")),
    }
}

#[command]
async fn ping() -> CommandResult<&'static str> {
    Ok("pong")
}

fn builtin_schemas() -> InMemorySchemaStore {
    InMemorySchemaStore::new()
        .with_schema(
            "math.add",
            json!({
                "type": "object",
                "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
                "required": ["a", "b"],
                "additionalProperties": false
            }),
        )
        .with_schema(
            "user.get",
            json!({
                "type": "object",
                "properties": {"id": {"type": "integer", "minimum": 1}},
                "required": ["id"]
            }),
        )
        .with_schema("system.ping", json!({"type": "object"}))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_observability(ObservabilityConfig::logs_only("stdin-pipeline").with_json_logs(false))?;

    let config = PipelineConfig::from_env()?;
    let mut builder = RpcPipeline::builder()
        .config(config)
        .command("math.add", add())
        .command("user.get", user_get())
        .command("system.ping", ping());
    if std::env::var_os(schemarpc::server::ENV_SCHEMA_ROOT).is_none() {
        builder = builder.schema_store(Arc::new(builtin_schemas()));
    }
    let pipeline = builder.build()?;

    let mut body = String::new();
    std::io::stdin().read_to_string(&mut body)?;

    println!("{}", pipeline.process_to_string(&body).await);

    shutdown_observability();
    Ok(())
}
