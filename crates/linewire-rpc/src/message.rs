use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{json, Value};

/// Opaque request id, echoed verbatim in the matching response.
///
/// Numeric ids keep the exact text they arrived as, so `1e2`, `1.50` and
/// integers wider than 64 bits come back unchanged. Two numeric ids are
/// equal only when their text is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestId {
    Number(NumericId),
    String(String),
    Null,
}

/// The text of a JSON number used as an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumericId(String);

impl NumericId {
    /// `None` unless `text` is exactly one JSON number.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        serde_json::from_str::<serde_json::Number>(text).ok()?;
        Some(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<serde_json::Number> for NumericId {
    fn from(number: serde_json::Number) -> Self {
        Self(number.to_string())
    }
}

impl RequestId {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Read an id from the raw JSON text of an `id` member.
    pub fn from_raw(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.as_bytes().first()? {
            b'"' => serde_json::from_str(text).ok().map(Self::String),
            b'n' => (text == "null").then_some(Self::Null),
            _ => NumericId::parse(text).map(Self::Number),
        }
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(number) => RawValue::from_string(number.0.clone())
                .map_err(ser::Error::custom)?
                .serialize(serializer),
            Self::String(id) => serializer.serialize_str(id),
            Self::Null => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Self::from_raw(raw.get())
            .ok_or_else(|| de::Error::custom("id must be a string, a number or null"))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(n.as_str()),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(NumericId(id.to_string()))
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

/// One decoded request line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    /// Handler payload. `null` when the line carried no `params`.
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Error category carried in a response's `error.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    HandlerError,
    FrameTooLarge,
}

impl ErrorKind {
    /// JSON-RPC style numeric code.
    pub fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::HandlerError => -32000,
            Self::FrameTooLarge => -32001,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "ParseError",
            Self::InvalidRequest => "InvalidRequest",
            Self::MethodNotFound => "MethodNotFound",
            Self::InvalidParams => "InvalidParams",
            Self::HandlerError => "HandlerError",
            Self::FrameTooLarge => "FrameTooLarge",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub kind: ErrorKind,
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorKind::MethodNotFound,
            format!("no handler registered for method {method:?}"),
        )
        .with_data(json!({ "method": method }))
    }

    pub fn frame_too_large(size: usize, max: usize) -> Self {
        Self::new(
            ErrorKind::FrameTooLarge,
            format!("input line of {size} bytes exceeds the {max} byte limit"),
        )
        .with_data(json!({ "size": size, "max": max }))
    }
}

/// One response line: `{"id":…,"result":…,"error":…}`.
///
/// Exactly one of `result` and `error` is set. Both keys are always
/// serialized, the unset one as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    pub result: Option<Value>,
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Successful response. A `null` result becomes the `{"ok":true}` acknowledgement.
    pub fn success(id: RequestId, result: Value) -> Self {
        let result = if result.is_null() {
            json!({ "ok": true })
        } else {
            result
        };
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, error: ErrorObject) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }
}
