//! Procedural macros for schemarpc
//!
//! # `#[command]`
//!
//! Turns an async function into a command factory, so a registry can be
//! assembled from plain functions:
//!
//! ```ignore
//! use schemarpc::{command, CommandError, CommandResult, RpcPipeline};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct GetUser { id: u64 }
//!
//! #[derive(Serialize)]
//! struct User { id: u64, name: String }
//!
//! #[command]
//! async fn user_get(dto: GetUser) -> CommandResult<User> {
//!     if dto.id == 0 {
//!         return Err(CommandError::invalid_params("User not found"));
//!     }
//!     Ok(User { id: dto.id, name: "alice".into() })
//! }
//!
//! let pipeline = RpcPipeline::builder()
//!     .command("user.get", user_get())
//!     .build()?;
//! ```
//!
//! The DTO argument is deserialized from the validated params. Use
//! `#[command(factory = path)]` to build it with an explicit constructor
//! `fn(serde_json::Value) -> Result<Dto, DtoError>` instead; a function
//! without an argument ignores params entirely.
//!
//! The return type must be `CommandResult<R>` with `R: Serialize`.
//!
//! # Limitations
//!
//! - Only async functions
//! - At most one argument
//! - No generics or `self`

mod command;

use proc_macro::TokenStream;

/// Generate `fn name() -> Box<dyn schemarpc_server::Command>` from an async fn
#[proc_macro_attribute]
pub fn command(attr: TokenStream, item: TokenStream) -> TokenStream {
    command::command_impl(attr.into(), item.into()).into()
}
