//! Schema documents and where they are loaded from
//!
//! Every method has one JSON Schema describing its `params`. A
//! [`SchemaStore`] finds that document by method name and compiles it into a
//! [`ParsedSchema`], so the expensive part (reading and compiling) happens
//! once per load and the result can be cached as-is.
//!
//! Two stores ship with the crate:
//!
//! - [`FsSchemaStore`]: `{root}/{method}.json` on disk
//! - [`InMemorySchemaStore`]: documents registered in code

use async_trait::async_trait;
use schemarpc_core::Error;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Why a schema could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaStoreError {
    /// No document exists for the method
    #[error("no schema for method '{0}'")]
    NotFound(String),

    #[error("failed to read schema for '{method}': {message}")]
    Io { method: String, message: String },

    /// The document is not JSON
    #[error("schema for '{method}' is not valid JSON: {message}")]
    Parse { method: String, message: String },

    /// The document is JSON but not a usable JSON Schema
    #[error("schema for '{method}' is not a valid JSON Schema: {message}")]
    InvalidSchema { method: String, message: String },
}

impl SchemaStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SchemaStoreError::NotFound(_))
    }
}

impl From<SchemaStoreError> for Error {
    fn from(err: SchemaStoreError) -> Self {
        match err {
            SchemaStoreError::NotFound(method) => Error::SchemaNotFound(method),
            SchemaStoreError::Io { message, .. } => Error::Io(message),
            SchemaStoreError::Parse { method, message }
            | SchemaStoreError::InvalidSchema { method, message } => {
                Error::InvalidSchema { method, message }
            }
        }
    }
}

/// A compiled schema document for one method
///
/// Immutable once built; shared between requests through `Arc`.
#[derive(Debug)]
pub struct ParsedSchema {
    method: String,
    document: Value,
    validator: jsonschema::Validator,
}

impl ParsedSchema {
    /// Compile a schema document
    ///
    /// # Errors
    ///
    /// [`SchemaStoreError::InvalidSchema`] when the document is not a valid
    /// JSON Schema.
    pub fn compile(method: impl Into<String>, document: Value) -> Result<Self, SchemaStoreError> {
        let method = method.into();
        let validator =
            jsonschema::validator_for(&document).map_err(|e| SchemaStoreError::InvalidSchema {
                method: method.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            method,
            document,
            validator,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The schema as written
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub(crate) fn validator(&self) -> &jsonschema::Validator {
        &self.validator
    }
}

/// Source of schema documents
///
/// Loads may block on I/O; they run on the request path only on cache misses.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Load and compile the schema for `method`
    async fn load_schema(&self, method: &str) -> Result<Arc<ParsedSchema>, SchemaStoreError>;
}

/// Schemas stored as `{root}/{method}.json`
#[derive(Debug, Clone)]
pub struct FsSchemaStore {
    root: PathBuf,
}

impl FsSchemaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the schema for `method`
    ///
    /// Returns `None` for names that could escape the root directory; those
    /// methods simply have no schema.
    pub fn schema_path(&self, method: &str) -> Option<PathBuf> {
        let unsafe_name = method.is_empty()
            || method.contains(['/', '\\', '\0'])
            || method.contains("..");
        if unsafe_name {
            return None;
        }
        Some(self.root.join(format!("{}.json", method)))
    }
}

#[async_trait]
impl SchemaStore for FsSchemaStore {
    async fn load_schema(&self, method: &str) -> Result<Arc<ParsedSchema>, SchemaStoreError> {
        let path = self
            .schema_path(method)
            .ok_or_else(|| SchemaStoreError::NotFound(method.to_string()))?;

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SchemaStoreError::NotFound(method.to_string()));
            }
            Err(e) => {
                return Err(SchemaStoreError::Io {
                    method: method.to_string(),
                    message: format!("{}: {}", path.display(), e),
                });
            }
        };

        let document: Value = serde_json::from_str(&text).map_err(|e| SchemaStoreError::Parse {
            method: method.to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!(method, path = %path.display(), "Loaded schema from disk");
        ParsedSchema::compile(method, document).map(Arc::new)
    }
}

/// Schemas registered in code
///
/// Each load compiles the stored document afresh, the same work a disk
/// store does, so caching behaves identically in front of either.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaStore {
    documents: HashMap<String, Value>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: impl Into<String>, document: Value) {
        self.documents.insert(method.into(), document);
    }

    pub fn with_schema(mut self, method: impl Into<String>, document: Value) -> Self {
        self.insert(method, document);
        self
    }

    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.documents.keys().cloned().collect();
        methods.sort();
        methods
    }
}

#[async_trait]
impl SchemaStore for InMemorySchemaStore {
    async fn load_schema(&self, method: &str) -> Result<Arc<ParsedSchema>, SchemaStoreError> {
        let document = self
            .documents
            .get(method)
            .cloned()
            .ok_or_else(|| SchemaStoreError::NotFound(method.to_string()))?;
        ParsedSchema::compile(method, document).map(Arc::new)
    }
}
