//! Error type for the Witness API client.
//!
//! # Design
//! Every failure path (transport, non-2xx status, malformed success body,
//! invalid caller input) converges on the single `ApiError` struct. Callers
//! catch one type; the `kind` field and the optional `code` / `issues` carry
//! the distinguishing information instead of separate variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::TransportError;

/// Broad category of an `ApiError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never produced an HTTP response (DNS, refused, timeout, TLS, ...).
    Transport,

    /// The server answered with a non-2xx status.
    Api,

    /// The server answered 2xx but the body was not valid JSON.
    Decode,

    /// A required argument was empty; no request was sent.
    InvalidArgument,
}

/// Machine-readable error code supplied by the server, or the HTTP status
/// when the server supplied no usable body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ErrorCode::Text(s) => Some(s),
            ErrorCode::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            ErrorCode::Number(n) => Some(*n),
            ErrorCode::Text(_) => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Number(n) => write!(f, "{n}"),
            ErrorCode::Text(s) => f.write_str(s),
        }
    }
}

impl PartialEq<&str> for ErrorCode {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<i64> for ErrorCode {
    fn eq(&self, other: &i64) -> bool {
        self.as_number() == Some(*other)
    }
}

/// Error body the Witness API returns with non-2xx responses. Any subset of
/// the fields may be missing.
#[derive(Debug)]
pub(crate) struct ErrorPayload {
    pub message: Option<String>,
    pub code: Option<ErrorCode>,
    pub issues: Option<Vec<Value>>,
}

impl ErrorPayload {
    /// Pick each known field out of `body` on its own. A field of the wrong
    /// type is dropped without affecting the others.
    pub fn from_object(body: &Map<String, Value>) -> Self {
        let code = match body.get("code") {
            Some(Value::String(s)) => Some(ErrorCode::Text(s.clone())),
            Some(Value::Number(n)) => n.as_i64().map(ErrorCode::Number),
            _ => None,
        };
        Self {
            message: body.get("message").and_then(Value::as_str).map(str::to_string),
            code,
            issues: body.get("issues").and_then(Value::as_array).cloned(),
        }
    }
}

/// The single error returned by every `WitnessClient` operation.
///
/// `message` is always populated. `code` and `issues` are only present when
/// the server provided them (or, for bodiless failures, `code` holds the
/// HTTP status).
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    code: Option<ErrorCode>,
    issues: Option<Vec<Value>>,
    status: Option<u16>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ApiError {
    pub(crate) fn transport(err: TransportError) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: format!("Request Error occurred: {err}"),
            code: None,
            issues: None,
            status: None,
            source: Some(Box::new(err)),
        }
    }

    /// Build an error from a non-2xx response whose body parsed as an error
    /// payload.
    pub(crate) fn from_payload(status: u16, payload: ErrorPayload) -> Self {
        Self {
            kind: ErrorKind::Api,
            message: payload
                .message
                .unwrap_or_else(|| status_message(status)),
            code: payload.code,
            issues: payload.issues,
            status: Some(status),
            source: None,
        }
    }

    /// Build an error from a non-2xx response with an empty or non-JSON body.
    pub(crate) fn from_status(status: u16) -> Self {
        Self {
            kind: ErrorKind::Api,
            message: status_message(status),
            code: Some(ErrorCode::Number(i64::from(status))),
            issues: None,
            status: Some(status),
            source: None,
        }
    }

    pub(crate) fn decode(status: u16, err: serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: format!("Invalid JSON response received: {err}"),
            code: None,
            issues: None,
            status: Some(status),
            source: Some(Box::new(err)),
        }
    }

    pub(crate) fn invalid_argument(name: &str) -> Self {
        Self {
            kind: ErrorKind::InvalidArgument,
            message: format!("Missing required parameter: {name}"),
            code: None,
            issues: None,
            status: None,
            source: None,
        }
    }

    pub(crate) fn serialization(err: serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidArgument,
            message: format!("Request body could not be serialized: {err}"),
            code: None,
            issues: None,
            status: None,
            source: Some(Box::new(err)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    /// Validation issues reported by the server, in the order received.
    pub fn issues(&self) -> Option<&[Value]> {
        self.issues.as_deref()
    }

    /// HTTP status of the response, when one was received.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_transport(&self) -> bool {
        self.kind == ErrorKind::Transport
    }

    pub fn is_decode(&self) -> bool {
        self.kind == ErrorKind::Decode
    }
}

fn status_message(status: u16) -> String {
    format!("Request failed with status {status}")
}

fn issue_message(issue: &Value) -> String {
    match issue.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => issue.to_string(),
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(code) = &self.code {
            write!(f, "\nError Code: {code}")?;
        }
        if let Some(issues) = self.issues.as_deref().filter(|i| !i.is_empty()) {
            f.write_str("\nIssues:")?;
            for issue in issues {
                write!(f, "\n - {}", issue_message(issue))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
