//! Method name → command mapping
//!
//! The registry is assembled once at startup through
//! [`CommandRegistryBuilder`] and is read-only afterwards, so it can be
//! cloned into every task without synchronization.
//!
//! ```rust
//! use schemarpc_server::{raw_command, CommandRegistry};
//!
//! let registry = CommandRegistry::builder()
//!     .command("system.ping", raw_command(|_| async { Ok(serde_json::json!("pong")) }))
//!     .build();
//!
//! assert!(registry.has_method("system.ping"));
//! ```

use crate::command::Command;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable mapping from method names to commands
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: Arc<HashMap<String, Arc<dyn Command>>>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::new()
    }

    pub fn get(&self, method: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(method).cloned()
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.commands.contains_key(method)
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.commands.keys().cloned().collect();
        methods.sort();
        methods
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Collects commands before the registry is frozen
#[derive(Default)]
pub struct CommandRegistryBuilder {
    commands: HashMap<String, Arc<dyn Command>>,
}

/// Start from an existing registry's commands
impl From<CommandRegistry> for CommandRegistryBuilder {
    fn from(registry: CommandRegistry) -> Self {
        Self {
            commands: registry.commands.as_ref().clone(),
        }
    }
}

impl CommandRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command; a later registration for the same method wins
    pub fn register(&mut self, method: impl Into<String>, command: Box<dyn Command>) {
        let method = method.into();
        if self.commands.insert(method.clone(), Arc::from(command)).is_some() {
            tracing::warn!(method = %method, "Command registered twice, keeping the last one");
        }
    }

    pub fn command(mut self, method: impl Into<String>, command: Box<dyn Command>) -> Self {
        self.register(method, command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            commands: Arc::new(self.commands),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::raw_command;
    use serde_json::json;

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = CommandRegistry::builder()
            .command("test", raw_command(|_| async { Ok(json!({"status": "ok"})) }))
            .build();

        assert!(registry.has_method("test"));
        assert!(!registry.has_method("unknown"));

        let command = registry.get("test").unwrap();
        let result = command.prepare(json!({})).unwrap().await.unwrap();
        assert_eq!(result, json!({"status": "ok"}));
    }

    #[test]
    fn test_methods_sorted() {
        let registry = CommandRegistry::builder()
            .command("user.list", raw_command(|_| async { Ok(json!([])) }))
            .command("user.get", raw_command(|_| async { Ok(json!({})) }))
            .build();

        assert_eq!(registry.methods(), vec!["user.get", "user.list"]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = CommandRegistry::builder()
            .command("v", raw_command(|_| async { Ok(json!(1)) }))
            .command("v", raw_command(|_| async { Ok(json!(2)) }))
            .build();

        assert_eq!(registry.len(), 1);
        let result = registry.get("v").unwrap().prepare(json!({})).unwrap().await.unwrap();
        assert_eq!(result, json!(2));
    }

    #[test]
    fn test_clones_share_commands() {
        let registry = CommandRegistry::builder()
            .command("a", raw_command(|_| async { Ok(json!(null)) }))
            .build();
        let clone = registry.clone();
        assert!(Arc::ptr_eq(&registry.commands, &clone.commands));
    }
}
