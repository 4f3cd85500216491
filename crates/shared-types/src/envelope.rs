//! # JSON-RPC Envelopes
//!
//! The request and response wrappers exchanged over the broker.
//!
//! - Requests are immutable once built; `params` is always a JSON object
//!   (a missing or `null` params field decodes as an empty object).
//! - Responses carry exactly one of `result` or `error`. The invariant is
//!   enforced at decode time and is unrepresentable in [`ResponsePayload`].

use crate::errors::{codes, EnvelopeError};
use crate::JSONRPC_VERSION;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Caller-generated request identifier.
///
/// Callers in the wild send both strings and numbers; numbers are kept in
/// their decimal text form so correlation is always by string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// A JSON-RPC request as published on a service's request topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, deserialize_with = "params_object")]
    pub params: Map<String, Value>,
}

fn params_object<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(de::Error::custom("params must be a JSON object")),
    }
}

impl RequestEnvelope {
    pub fn new(id: impl Into<RequestId>, method: &str, params: Map<String, Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.to_string(),
            params,
        }
    }

    /// Decode and validate a request.
    ///
    /// # Errors
    ///
    /// - `Malformed` - not JSON or not a request object
    /// - `UnsupportedVersion` - `jsonrpc` is not "2.0"
    /// - `MissingId` - the id is empty
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let request: Self =
            serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        if request.jsonrpc != JSONRPC_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(request.jsonrpc));
        }
        if request.id.is_empty() {
            return Err(EnvelopeError::MissingId);
        }
        Ok(request)
    }

    /// Best-effort id extraction from a payload that failed to decode, so the
    /// error response can still be correlated by the caller.
    #[must_use]
    pub fn peek_id(bytes: &[u8]) -> Option<RequestId> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let id = value.get("id")?.clone();
        serde_json::from_value::<RequestId>(id)
            .ok()
            .filter(|id| !id.is_empty())
    }

    /// Encode for publishing.
    pub fn to_vec(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }
}

/// Structured JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default = "default_error_code")]
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn default_error_code() -> i32 {
    codes::SERVER_ERROR
}

impl RpcErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(details: impl fmt::Display) -> Self {
        Self::new(codes::PARSE_ERROR, format!("Parse error: {details}"))
    }

    pub fn invalid_request(details: impl fmt::Display) -> Self {
        Self::new(codes::INVALID_REQUEST, format!("Invalid request: {details}"))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Unknown method: {method}"))
    }

    pub fn internal(details: impl fmt::Display) -> Self {
        Self::new(codes::INTERNAL_ERROR, format!("Internal error: {details}"))
    }
}

impl fmt::Display for RpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&EnvelopeError> for RpcErrorObject {
    fn from(err: &EnvelopeError) -> Self {
        match err {
            EnvelopeError::Malformed(details) => Self::parse_error(details),
            other => Self::invalid_request(other),
        }
    }
}

/// Body of a response: exactly one of result or error.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Result(Value),
    Error(RpcErrorObject),
}

/// A JSON-RPC response as published on a service's response topic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireResponse")]
pub struct ResponseEnvelope {
    pub jsonrpc: String,
    pub id: RequestId,
    pub payload: ResponsePayload,
}

impl ResponseEnvelope {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    pub fn failure(id: RequestId, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }

    /// Split into the result value or the envelope-level error.
    pub fn into_result(self) -> Result<Value, RpcErrorObject> {
        match self.payload {
            ResponsePayload::Result(value) => Ok(value),
            ResponsePayload::Error(error) => Err(error),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| {
            // try_from failures surface as serde custom errors; keep their text
            EnvelopeError::Malformed(e.to_string())
        })
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResponseEnvelope", 3)?;
        state.serialize_field("jsonrpc", &self.jsonrpc)?;
        state.serialize_field("id", &self.id)?;
        match &self.payload {
            ResponsePayload::Result(value) => state.serialize_field("result", value)?,
            ResponsePayload::Error(error) => state.serialize_field("error", error)?,
        }
        state.end()
    }
}

/// Loose decode target; `present` keeps an explicit `null` distinct from an
/// absent field so `"result": null` still counts as a result.
#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    error: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TryFrom<WireResponse> for ResponseEnvelope {
    type Error = EnvelopeError;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        let jsonrpc = wire.jsonrpc.unwrap_or_else(|| JSONRPC_VERSION.to_string());
        if jsonrpc != JSONRPC_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(jsonrpc));
        }

        let id = wire
            .id
            .filter(|id| !id.is_empty())
            .ok_or(EnvelopeError::MissingId)?;

        let payload = match (wire.result, wire.error) {
            (Some(_), Some(_)) => return Err(EnvelopeError::AmbiguousResponse),
            (None, None) => return Err(EnvelopeError::EmptyResponse),
            (Some(result), None) => ResponsePayload::Result(result),
            (None, Some(Value::String(message))) => {
                ResponsePayload::Error(RpcErrorObject::new(codes::SERVER_ERROR, message))
            }
            (None, Some(error @ Value::Object(_))) => ResponsePayload::Error(
                serde_json::from_value(error)
                    .map_err(|e| EnvelopeError::Malformed(format!("error object: {e}")))?,
            ),
            (None, Some(_)) => {
                return Err(EnvelopeError::Malformed(
                    "error must be a string or an object".into(),
                ))
            }
        };

        Ok(Self { jsonrpc, id, payload })
    }
}
