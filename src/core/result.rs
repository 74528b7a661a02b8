//! Call results as values: every asset update ends in a `CallResult`.
//!
//! Actions never unwind past an update; failures are captured as
//! `CallResult::Error` and carried in the asset record like any other data.

use crate::core::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Captured failure: message, error kind, context frames, and an optional
/// earlier error this one superseded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallError {
    pub message: String,
    pub exception: String,
    pub stacktrace: Vec<String>,
    pub prior: Option<Box<CallError>>,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exception: "Internal".to_string(),
            stacktrace: Vec::new(),
            prior: None,
        }
    }

    pub fn from_store_error(err: &StoreError) -> Self {
        Self {
            message: err.to_string(),
            exception: err.kind().to_string(),
            stacktrace: vec![err.to_string()],
            prior: None,
        }
    }

    /// Prepend a context line, the way nested handlers annotate a failure.
    pub fn with_context(mut self, context: &str) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self.stacktrace.insert(0, context.to_string());
        self
    }

    pub fn with_prior(mut self, prior: CallError) -> Self {
        self.prior = Some(Box::new(prior));
        self
    }

    pub fn as_json(&self) -> JsonValue {
        serde_json::json!({
            "message": self.message,
            "exception": self.exception,
            "stacktrace": self.stacktrace,
        })
    }
}

/// Monadic result of invoking an asset's action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CallResult {
    Valid(JsonValue),
    Error(CallError),
}

impl CallResult {
    /// Generic constructor: a value becomes `Valid`, an existing result is
    /// passed through unchanged so results can be chained.
    pub fn of(value: JsonValue) -> Self {
        Self::Valid(value)
    }

    pub fn valid(value: JsonValue) -> Self {
        Self::Valid(value)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(CallError::new(message))
    }

    pub fn from_store_error(err: &StoreError, context: &str) -> Self {
        Self::Error(CallError::from_store_error(err).with_context(context))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_valid(&self) -> bool {
        !self.is_error()
    }

    /// Apply `func` to a valid value; short-circuit an error. A failure
    /// inside `func` is captured, not propagated.
    pub fn then<F>(self, func: F) -> Self
    where
        F: FnOnce(JsonValue) -> Result<JsonValue>,
    {
        match self {
            Self::Valid(value) => match func(value) {
                Ok(next) => Self::Valid(next),
                Err(err) => Self::from_store_error(&err, "then() failed"),
            },
            err @ Self::Error(_) => err,
        }
    }

    /// The dual of [`then`](Self::then): `func` runs on errors only and may
    /// replace the error with a recovery value.
    pub fn on_error<F>(self, func: F) -> Self
    where
        F: FnOnce(&CallError) -> Result<JsonValue>,
    {
        match self {
            valid @ Self::Valid(_) => valid,
            Self::Error(error) => match func(&error) {
                Ok(value) => Self::Valid(value),
                Err(err) => Self::Error(
                    CallError::from_store_error(&err)
                        .with_context("on_error() failed")
                        .with_prior(error),
                ),
            },
        }
    }

    /// The effective value, or `default` on an error.
    pub fn get_result(&self, default: JsonValue) -> JsonValue {
        match self {
            Self::Valid(value) => value.clone(),
            Self::Error(_) => default,
        }
    }

    /// The raising flavor of [`get_result`](Self::get_result).
    pub fn into_result(self) -> Result<JsonValue> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Error(error) => Err(StoreError::Internal(error.message)),
        }
    }

    pub fn error_info(&self) -> Option<&CallError> {
        match self {
            Self::Valid(_) => None,
            Self::Error(error) => Some(error),
        }
    }
}

/// Run `func`, capturing a failure as an error result.
pub fn try_call<F>(func: F) -> CallResult
where
    F: FnOnce() -> Result<JsonValue>,
{
    match func() {
        Ok(value) => CallResult::Valid(value),
        Err(err) => CallResult::from_store_error(&err, "call failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_then_chains_valid_results() {
        let result = CallResult::valid(json!(5))
            .then(|v| Ok(json!(v.as_i64().unwrap() + 1)))
            .then(|v| Ok(json!(v.as_i64().unwrap() * 2)));
        assert_eq!(result.get_result(JsonValue::Null), json!(12));
    }

    #[test]
    fn test_then_short_circuits_errors() {
        let result = CallResult::error("boom").then(|_| Ok(json!("unreachable")));
        assert!(result.is_error());
        assert_eq!(result.get_result(json!("fallback")), json!("fallback"));
    }

    #[test]
    fn test_on_error_recovers() {
        let result = CallResult::error("boom").on_error(|e| {
            assert_eq!(e.message, "boom");
            Ok(json!("recovered"))
        });
        assert_eq!(result.get_result(JsonValue::Null), json!("recovered"));
    }

    #[test]
    fn test_failed_recovery_keeps_prior_error() {
        let result = CallResult::error("first")
            .on_error(|_| Err(StoreError::Internal("second".to_string())));
        let info = result.error_info().unwrap();
        assert!(info.message.contains("second"));
        assert_eq!(info.prior.as_ref().unwrap().message, "first");
    }

    #[test]
    fn test_try_call_captures_failures() {
        let ok = try_call(|| Ok(json!(1)));
        assert!(ok.is_valid());

        let failed = try_call(|| Err(StoreError::NotFound("nope".to_string())));
        assert_eq!(failed.error_info().unwrap().exception, "NotFound");
    }
}
