//! Response assembly
//!
//! Turns the dispatched responses of one body into the final output value.
//! All responses of a call are stamped with the same assembly time.

use chrono::{DateTime, Utc};
use schemarpc_core::{
    Id, JsonRpcErrorData, JsonRpcResponse, PipelineOutput, RequestCollection,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Final output for `collection`, stamped with the current time
    ///
    /// `responses` must be aligned with `collection.entries()`.
    pub fn assemble(
        &self,
        collection: &RequestCollection,
        responses: Vec<JsonRpcResponse>,
    ) -> PipelineOutput {
        self.assemble_at(collection, responses, Utc::now())
    }

    pub fn assemble_at(
        &self,
        collection: &RequestCollection,
        responses: Vec<JsonRpcResponse>,
        now: DateTime<Utc>,
    ) -> PipelineOutput {
        if responses.len() != collection.len() {
            tracing::error!(
                entries = collection.len(),
                responses = responses.len(),
                "Response count does not match entry count"
            );
        }

        // Every entry gets exactly one response, whatever the dispatcher returned
        let mut responses = responses.into_iter();
        let mut aligned: Vec<JsonRpcResponse> = collection
            .entries()
            .iter()
            .map(|entry| {
                let id = entry.response_id();
                match responses.next() {
                    Some(response) => response.with_id(id),
                    None => JsonRpcResponse::error(JsonRpcErrorData::internal_error(), id),
                }
            })
            .collect();

        for response in &mut aligned {
            response.stamp(now);
        }

        if collection.is_batch() {
            PipelineOutput::Batch(aligned)
        } else {
            match aligned.pop() {
                Some(response) => PipelineOutput::Single(response),
                None => self.failure_at(JsonRpcErrorData::internal_error(), now),
            }
        }
    }

    /// Top-level failure answered with a single object and a null id
    ///
    /// Used for parse errors, empty batches and oversized batches.
    pub fn failure(&self, error: JsonRpcErrorData) -> PipelineOutput {
        self.failure_at(error, Utc::now())
    }

    pub fn failure_at(&self, error: JsonRpcErrorData, now: DateTime<Utc>) -> PipelineOutput {
        let mut response = JsonRpcResponse::error(error, Id::Null);
        response.stamp(now);
        PipelineOutput::Single(response)
    }
}
