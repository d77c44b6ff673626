//! Pipeline metrics
//!
//! OpenTelemetry instruments recorded while processing requests. They export
//! through whatever meter provider is installed globally (see
//! `schemarpc_core::init_observability`); with none installed they are no-ops.
//!
//! - **schemarpc.requests.total**: dispatched entries, by method and status
//! - **schemarpc.request.duration**: dispatch latency in seconds
//! - **schemarpc.batch.size**: entries per batch body
//! - **schemarpc.schema_cache.hits** / **misses**: schema cache effectiveness
//! - **schemarpc.errors.total**: error responses, by code

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

pub struct PipelineMetrics {
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub batch_size: Histogram<u64>,
    pub cache_hits: Counter<u64>,
    pub cache_misses: Counter<u64>,
    pub errors_total: Counter<u64>,
}

impl PipelineMetrics {
    /// Instruments on the global meter named after the service
    pub fn new(service_name: impl Into<String>) -> Self {
        let meter = global::meter_with_scope(
            opentelemetry::InstrumentationScope::builder(service_name.into()).build(),
        );
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("schemarpc.requests.total")
                .with_description("Total number of request entries dispatched")
                .build(),
            request_duration: meter
                .f64_histogram("schemarpc.request.duration")
                .with_description("Entry dispatch duration in seconds")
                .build(),
            batch_size: meter
                .u64_histogram("schemarpc.batch.size")
                .with_description("Number of entries in batch bodies")
                .build(),
            cache_hits: meter
                .u64_counter("schemarpc.schema_cache.hits")
                .with_description("Schema lookups served from cache")
                .build(),
            cache_misses: meter
                .u64_counter("schemarpc.schema_cache.misses")
                .with_description("Schema lookups that went to the schema store")
                .build(),
            errors_total: meter
                .u64_counter("schemarpc.errors.total")
                .with_description("Total number of error responses")
                .build(),
        }
    }

    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_batch(&self, size: u64, mode: &str) {
        self.batch_size
            .record(size, &[KeyValue::new("mode", mode.to_string())]);
    }

    pub fn record_cache_hit(&self, method: &str) {
        self.cache_hits
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    pub fn record_cache_miss(&self, method: &str) {
        self.cache_misses
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    pub fn record_error(&self, code: i32) {
        self.errors_total
            .add(1, &[KeyValue::new("code", code as i64)]);
    }
}
