//! Outgoing request description and construction.
//!
//! # Design Decisions
//! - One request ID per call, shared by all of its attempts
//! - Build errors (bad URL, bad header) are fatal, never retried

use std::fmt;

use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use crate::resilience::FetchError;

/// Header carrying the per-call correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation ID attached to every attempt of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Method, headers and JSON body of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self::with_method(Method::POST)
    }

    pub fn put() -> Self {
        Self::with_method(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::with_method(Method::DELETE)
    }

    pub fn with_method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body; sets `Content-Type: application/json`.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Turn a URL and options into a ready-to-send request.
pub fn build_request(
    client: &reqwest::Client,
    url: &str,
    options: &RequestOptions,
    request_id: &RequestId,
) -> Result<reqwest::Request, FetchError> {
    let mut builder = client
        .request(options.method.clone(), url)
        .header(X_REQUEST_ID, request_id.as_str());

    for (name, value) in &options.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &options.body {
        builder = builder.json(body);
    }

    builder
        .build()
        .map_err(|e| FetchError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builds_request_with_id_and_body() {
        let client = reqwest::Client::new();
        let id = RequestId::new();
        let options = RequestOptions::put()
            .header("x-telegram-id", "42")
            .json(json!({ "view_mode": "grid" }));

        let request = build_request(&client, "http://localhost/users/42/settings", &options, &id).unwrap();

        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.headers()[X_REQUEST_ID], id.as_str());
        assert_eq!(request.headers()["x-telegram-id"], "42");
        assert_eq!(request.headers()["content-type"], "application/json");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(body).unwrap(), json!({ "view_mode": "grid" }));
    }

    #[test]
    fn test_invalid_url_is_invalid_request() {
        let client = reqwest::Client::new();
        let err = build_request(&client, "not a url", &RequestOptions::get(), &RequestId::new()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
