//! # Result Shape Convention
//!
//! Handlers never answer with a bare value. A success is an object with
//! `success: true` plus operation-specific fields; a handler failure is
//! `{success: false, error, error_kind}`. Callers branch on `success`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Class of a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing or invalid parameter.
    Validation,
    /// Duplicate name or id on create.
    Conflict,
    /// Target instance or route does not exist.
    NotFound,
    /// The operation could not be applied; nothing was changed.
    State,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::State => "state",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "validation" => Some(Self::Validation),
            "conflict" => Some(Self::Conflict),
            "not_found" => Some(Self::NotFound),
            "state" => Some(Self::State),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler outcome in the uniform result shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Map<String, Value>),
    Failure { kind: FailureKind, error: String },
}

impl Outcome {
    /// Bare `{success: true}`.
    #[must_use]
    pub fn success() -> Self {
        Self::Success(Map::new())
    }

    /// `{success: true, message}`.
    pub fn message(message: impl Into<String>) -> Self {
        Self::success().with("message", message.into())
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            error: error.into(),
        }
    }

    /// Attach a field to a success. No-op on a failure.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        if let Self::Success(fields) = &mut self {
            fields.insert(
                key.to_string(),
                serde_json::to_value(value).unwrap_or_default(),
            );
        }
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Field of a success, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Success(fields) => fields.get(key),
            Self::Failure { .. } => None,
        }
    }

    /// Render into the JSON-RPC `result` value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Success(mut fields) => {
                fields.insert("success".into(), Value::Bool(true));
                Value::Object(fields)
            }
            Self::Failure { kind, error } => {
                let mut fields = Map::new();
                fields.insert("success".into(), Value::Bool(false));
                fields.insert("error".into(), Value::String(error));
                fields.insert("error_kind".into(), Value::String(kind.as_str().into()));
                Value::Object(fields)
            }
        }
    }

    /// Interpret a `result` value received from a service.
    ///
    /// Anything that is not an object with `success: false` counts as a
    /// success; a failure without a recognizable `error_kind` is `State`.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            let mut fields = Map::new();
            fields.insert("data".into(), value);
            return Self::Success(fields);
        };

        if fields.get("success") == Some(&Value::Bool(false)) {
            let error = match fields.remove("error") {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => "unspecified error".into(),
            };
            let kind = fields
                .get("error_kind")
                .and_then(Value::as_str)
                .and_then(FailureKind::parse)
                .unwrap_or(FailureKind::State);
            return Self::Failure { kind, error };
        }

        fields.remove("success");
        Self::Success(fields)
    }
}
