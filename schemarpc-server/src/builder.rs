//! Pipeline builder
//!
//! The builder provides a fluent API for assembling an [`RpcPipeline`]. It
//! starts from a [`PipelineConfig`] and lets you:
//! - Register commands
//! - Choose the schema store and cache backend
//! - Configure batch processing and handler timeouts
//! - Enable metrics and observability
//!
//! # Examples
//!
//! ```rust,no_run
//! use schemarpc_server::{raw_command, BatchMode, RpcPipeline};
//! use std::time::Duration;
//!
//! # fn example() -> schemarpc_core::Result<()> {
//! let pipeline = RpcPipeline::builder()
//!     .schema_root("./schemas")
//!     .command("system.ping", raw_command(|_| async {
//!         Ok(serde_json::json!({"pong": true}))
//!     }))
//!     .batch_mode(BatchMode::Parallel)
//!     .max_batch_size(100)
//!     .handler_timeout(Duration::from_secs(5))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::{
    BatchMode, BatchProcessor, CacheBackend, Command, CommandRegistry, CommandRegistryBuilder,
    FsSchemaStore, InMemoryCacheBackend, NoopCacheBackend, PipelineConfig, PipelineMetrics,
    RequestDispatcher, ResponseAssembler, RpcPipeline, SchemaCache, SchemaStore,
};
use schemarpc_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing an [`RpcPipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    commands: CommandRegistryBuilder,
    schema_store: Option<Arc<dyn SchemaStore>>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    metrics: Option<Arc<PipelineMetrics>>,
    observability_config: Option<schemarpc_core::ObservabilityConfig>,
}

impl PipelineBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a builder from a loaded configuration
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            commands: CommandRegistryBuilder::new(),
            schema_store: None,
            cache_backend: None,
            metrics: None,
            observability_config: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a command for a method
    pub fn command(mut self, method: impl Into<String>, command: Box<dyn Command>) -> Self {
        self.commands.register(method, command);
        self
    }

    /// Set the registry (replaces any previously registered commands)
    pub fn registry(mut self, registry: CommandRegistry) -> Self {
        self.commands = registry.into();
        self
    }

    /// Directory for the filesystem schema store
    pub fn schema_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.schema_root = root.into();
        self
    }

    /// Use a custom schema store instead of the filesystem one
    pub fn schema_store(mut self, store: Arc<dyn SchemaStore>) -> Self {
        self.schema_store = Some(store);
        self
    }

    /// Use a custom cache backend instead of the in-memory one
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn cache_project(mut self, project: impl Into<String>) -> Self {
        self.config.cache.project = project.into();
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache = self.config.cache.with_ttl(ttl);
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    /// Set the batch processing mode
    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.config.batch.mode = mode;
        self
    }

    /// Set the maximum batch size limit (unlimited by default)
    pub fn max_batch_size(mut self, max_size: usize) -> Self {
        self.config.batch.max_size = Some(max_size);
        self
    }

    /// Fail commands that run longer than `timeout`
    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.config.handler_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Record pipeline metrics on the given instruments
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Initialise tracing and OpenTelemetry when building
    ///
    /// Metrics are recorded on the service's meter unless
    /// [`with_metrics`](Self::with_metrics) supplied other instruments.
    pub fn with_observability(mut self, config: schemarpc_core::ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRequest` for an empty cache project
    /// - `Error::Internal` when observability cannot be initialised
    pub fn build(self) -> Result<RpcPipeline> {
        let config = self.config;
        if config.cache.project.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "Cache project must not be empty".to_string(),
            ));
        }

        // Initialize observability if configured
        let metrics = match self.observability_config {
            Some(observability) => {
                let service_name = observability.service_name.clone();
                schemarpc_core::init_observability(observability).map_err(|e| {
                    Error::Internal(format!("Failed to initialize observability: {}", e))
                })?;
                Some(
                    self.metrics
                        .unwrap_or_else(|| Arc::new(PipelineMetrics::new(service_name))),
                )
            }
            None => self.metrics,
        };

        let store: Arc<dyn SchemaStore> = match self.schema_store {
            Some(store) => store,
            None => {
                tracing::debug!(root = ?config.schema_root, "Using filesystem schema store");
                Arc::new(FsSchemaStore::new(config.schema_root.clone()))
            }
        };

        let backend: Arc<dyn CacheBackend> = match self.cache_backend {
            Some(backend) => backend,
            None if config.cache.enabled => Arc::new(InMemoryCacheBackend::new()),
            None => Arc::new(NoopCacheBackend),
        };

        let mut schemas = SchemaCache::new(store, backend, config.cache.clone());
        let mut batch = BatchProcessor::with_limit(config.batch.mode, config.batch.max_size);
        if let Some(metrics) = &metrics {
            schemas = schemas.with_metrics(Arc::clone(metrics));
            batch = batch.with_metrics(Arc::clone(metrics));
        }

        let registry = self.commands.build();
        if registry.is_empty() {
            tracing::warn!("Pipeline built without any commands");
        }

        let mut dispatcher = RequestDispatcher::new(registry, Arc::new(schemas))
            .with_handler_timeout(config.handler_timeout());
        if let Some(metrics) = metrics {
            dispatcher = dispatcher.with_metrics(metrics);
        }

        tracing::info!(
            methods = dispatcher.registry().len(),
            project = %config.cache.project,
            cache_enabled = config.cache.enabled,
            batch_mode = config.batch.mode.as_str(),
            "Pipeline ready"
        );

        Ok(RpcPipeline {
            dispatcher,
            batch,
            assembler: ResponseAssembler::new(),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
