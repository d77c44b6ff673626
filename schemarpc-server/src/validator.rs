//! Parameter validation against a method's schema
//!
//! All violations are collected rather than stopping at the first one, so a
//! client fixing a request sees everything that is wrong in one round trip.

use crate::schema_store::ParsedSchema;
use serde::Serialize;
use serde_json::{Map, Value};

/// One schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// JSON pointer into `params` (empty for the params object itself)
    pub path: String,
    pub message: String,
}

/// Validates `params` values against compiled schemas
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterValidator;

impl ParameterValidator {
    pub fn new() -> Self {
        Self
    }

    /// Every violation of `schema` by `params`; empty means valid
    ///
    /// Missing params are validated as `{}`.
    pub fn validate(&self, schema: &ParsedSchema, params: Option<&Value>) -> Vec<Violation> {
        let empty = Value::Object(Map::new());
        let instance = params.unwrap_or(&empty);

        schema
            .validator()
            .iter_errors(instance)
            .map(|error| Violation {
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect()
    }
}

/// `data` member for an Invalid params response
pub fn violations_data(violations: &[Violation]) -> Value {
    serde_json::json!({ "violations": violations })
}
