//! Request dispatch: the single path every Witness call goes through.
//!
//! # Design
//! `RequestDispatcher` holds only the immutable `ClientConfig` and a
//! transport. A call is split into `build_request` (pure, produces an
//! `HttpRequest`), the transport round-trip, and `parse_response` (pure,
//! classifies the `HttpResponse`). Keeping the two ends pure lets tests check
//! request shape and error classification without a network.

use std::fmt;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorPayload};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};

/// Scalar query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Text(String),
    Number(u64),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Text(s) => f.write_str(s),
            QueryValue::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Text(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Text(s)
    }
}

impl From<u64> for QueryValue {
    fn from(n: u64) -> Self {
        QueryValue::Number(n)
    }
}

/// One call to the API: method, resolved path, query and optional JSON body.
///
/// GET specs cannot carry a body; absent query values are never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    method: HttpMethod,
    path: String,
    query: Vec<(String, QueryValue)>,
    body: Option<Value>,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds the parameter only when `value` is present.
    pub fn query_opt<V: Into<QueryValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &[(String, QueryValue)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Builds, sends and classifies requests for one configured client.
#[derive(Debug, Clone)]
pub struct RequestDispatcher<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl RequestDispatcher<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self { config, transport }
    }
}

impl<T: Transport> RequestDispatcher<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `spec` and return the decoded JSON body unchanged.
    pub fn dispatch(&self, spec: RequestSpec) -> Result<Value, ApiError> {
        let request = self.build_request(&spec)?;
        tracing::debug!(method = %request.method, url = %request.url, "dispatching witness request");

        let response = self.transport.execute(&request).map_err(|e| {
            tracing::warn!(error = %e, url = %request.url, "witness request failed in transport");
            ApiError::transport(e)
        })?;

        self.parse_response(response).inspect_err(|e| {
            tracing::warn!(status = ?e.status(), error = %e.message(), url = %request.url, "witness request failed");
        })
    }

    /// Resolve `spec` against the configured base URL and attach headers.
    pub fn build_request(&self, spec: &RequestSpec) -> Result<HttpRequest, ApiError> {
        let mut url = self.config.base_url().clone();
        let path = format!("{}{}", url.path().trim_end_matches('/'), spec.path);
        url.set_path(&path);
        if !spec.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &spec.query {
                pairs.append_pair(key, &value.to_string());
            }
        }

        let mut headers = Vec::new();
        let body = match (spec.method, &spec.body) {
            (HttpMethod::Post, Some(body)) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(serde_json::to_string(body).map_err(ApiError::serialization)?)
            }
            _ => None,
        };
        if let Some(token) = self.config.token() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        Ok(HttpRequest {
            method: spec.method,
            url: url.into(),
            headers,
            body,
        })
    }

    /// Classify a received response. 2xx bodies are returned as-is; anything
    /// else becomes an `ApiError`.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        let status = response.status;
        if response.is_success() {
            return serde_json::from_slice(&response.body).map_err(|e| ApiError::decode(status, e));
        }

        let err = match serde_json::from_slice::<Value>(&response.body) {
            Ok(Value::Object(body)) => {
                ApiError::from_payload(status, ErrorPayload::from_object(&body))
            }
            _ => ApiError::from_status(status),
        };
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::TransportError;
    use crate::testutil::RecordingTransport;
    use serde_json::json;

    fn dispatcher(token: Option<&str>) -> RequestDispatcher<RecordingTransport> {
        let mut config = ClientConfig::new()
            .with_base_url("http://localhost:3000")
            .unwrap();
        if let Some(token) = token {
            config = config.with_token(token);
        }
        RequestDispatcher::with_transport(config, RecordingTransport::new())
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body)
    }

    #[test]
    fn get_without_query_has_no_body_or_headers() {
        let req = dispatcher(None)
            .build_request(&RequestSpec::get("/getTreeState"))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/getTreeState");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn query_values_are_encoded_and_absent_ones_skipped() {
        let spec = RequestSpec::get("/getProofForLeafHash")
            .query("leafHash", "0xab cd")
            .query_opt("targetTreeSize", None::<u64>)
            .query("chainId", 8453u64);
        let req = dispatcher(None).build_request(&spec).unwrap();
        assert_eq!(
            req.url,
            "http://localhost:3000/getProofForLeafHash?leafHash=0xab+cd&chainId=8453"
        );
    }

    #[test]
    fn post_sets_content_type_and_serializes_body() {
        let spec = RequestSpec::post("/postLeafHash", json!({"leafHash": "0x01"}));
        let req = dispatcher(None).build_request(&spec).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"leafHash": "0x01"}));
    }

    #[test]
    fn token_adds_bearer_header() {
        let req = dispatcher(Some("secret"))
            .build_request(&RequestSpec::get("/_health"))
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer secret"));
    }

    #[test]
    fn base_path_is_preserved() {
        let config = ClientConfig::new()
            .with_base_url("https://example.com/witness/")
            .unwrap();
        let d = RequestDispatcher::with_transport(config, RecordingTransport::new());
        let req = d.build_request(&RequestSpec::get("/getTreeState")).unwrap();
        assert_eq!(req.url, "https://example.com/witness/getTreeState");
    }

    #[test]
    fn success_body_is_returned_unchanged() {
        let value = dispatcher(None)
            .parse_response(response(200, r#"{"height": 42}"#))
            .unwrap();
        assert_eq!(value, json!({"height": 42}));
    }

    #[test]
    fn not_found_with_payload() {
        let err = dispatcher(None)
            .parse_response(response(404, r#"{"message":"not found","code":"NOT_FOUND"}"#))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.message(), "not found");
        assert!(err.code().is_some_and(|c| *c == "NOT_FOUND"));
        assert!(err.issues().is_none());
    }

    #[test]
    fn empty_server_error() {
        let err = dispatcher(None).parse_response(response(500, "")).unwrap_err();
        assert_eq!(err.message(), "Request failed with status 500");
        assert!(err.code().is_some_and(|c| *c == 500i64));
        assert!(err.issues().is_none());
    }

    #[test]
    fn html_error_body_falls_back_to_status() {
        let err = dispatcher(None)
            .parse_response(response(502, "<html>Bad Gateway</html>"))
            .unwrap_err();
        assert_eq!(err.message(), "Request failed with status 502");
        assert!(err.code().is_some_and(|c| *c == 502i64));
    }

    #[test]
    fn non_object_json_error_body_falls_back_to_status() {
        let err = dispatcher(None)
            .parse_response(response(400, r#"["bad", "request"]"#))
            .unwrap_err();
        assert_eq!(err.message(), "Request failed with status 400");
        assert!(err.code().is_some_and(|c| *c == 400i64));
    }

    #[test]
    fn payload_without_message_keeps_server_code() {
        let err = dispatcher(None)
            .parse_response(response(401, r#"{"code":"UNAUTHORIZED"}"#))
            .unwrap_err();
        assert_eq!(err.message(), "Request failed with status 401");
        assert!(err.code().is_some_and(|c| *c == "UNAUTHORIZED"));
    }

    #[test]
    fn mistyped_fields_do_not_discard_the_rest() {
        let d = dispatcher(None);

        let err = d
            .parse_response(response(429, r#"{"message":"Rate limited","code":true}"#))
            .unwrap_err();
        assert_eq!(err.message(), "Rate limited");
        assert!(err.code().is_none());

        let err = d
            .parse_response(response(429, r#"{"message":"Bad","issues":{"leafHash":"bad"}}"#))
            .unwrap_err();
        assert_eq!(err.message(), "Bad");
        assert!(err.issues().is_none());

        let err = d
            .parse_response(response(429, r#"{"message":"x","code":4.5}"#))
            .unwrap_err();
        assert_eq!(err.message(), "x");
        assert!(err.code().is_none());
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn non_utf8_bodies_are_classified_by_status() {
        let d = dispatcher(None);

        let err = d
            .parse_response(HttpResponse::new(502, b"\xff\xfe\x00binary".to_vec()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.message(), "Request failed with status 502");
        assert!(err.code().is_some_and(|c| *c == 502i64));

        let err = d
            .parse_response(HttpResponse::new(200, b"\xff\xfe".to_vec()))
            .unwrap_err();
        assert!(err.is_decode());
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn issues_are_kept_in_order() {
        let body = r#"{"message":"Invalid input","code":"BAD_REQUEST","issues":[{"message":"a"},{"message":"b"}]}"#;
        let err = dispatcher(None).parse_response(response(400, body)).unwrap_err();
        let issues = err.issues().unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0]["message"], "a");
        assert_eq!(issues[1]["message"], "b");
    }

    #[test]
    fn malformed_success_body_is_a_decode_error() {
        let err = dispatcher(None)
            .parse_response(response(200, "{not json"))
            .unwrap_err();
        assert!(err.is_decode());
        assert!(err.message().starts_with("Invalid JSON response received"));
        assert!(err.code().is_none());
    }

    #[test]
    fn transport_failure_is_wrapped() {
        let d = dispatcher(None);
        d.transport()
            .push_failure(TransportError::ConnectionFailed("refused".to_string()));
        let err = d.dispatch(RequestSpec::get("/getTreeState")).unwrap_err();
        assert!(err.is_transport());
        assert!(err.code().is_none());
        assert!(err.issues().is_none());
    }

    #[test]
    fn dispatch_sends_built_request() {
        let d = dispatcher(Some("t"));
        d.transport().push_response(200, r#"{"ok":true}"#);
        let value = d
            .dispatch(RequestSpec::get("/getLatestCheckpoint").query("chainId", 1u64))
            .unwrap();
        assert_eq!(value, json!({"ok": true}));

        let sent = d.transport().requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://localhost:3000/getLatestCheckpoint?chainId=1");
        assert_eq!(sent[0].header("authorization"), Some("Bearer t"));
    }
}
