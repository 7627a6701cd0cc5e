//! Turns an upstream answer into the response the caller sees.
//!
//! Error statuses are relayed untouched, with the body normalized to JSON when it
//! parses. A success status must carry valid JSON, otherwise the proxy reports
//! the contract violation itself with a 500.

use http::header::{CONTENT_TYPE, HeaderValue};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde_json::{Value, json};

pub const MISSING_SECRET_MESSAGE: &str = "Appfigures PAT environment variable not set.";
pub const INVALID_JSON_MESSAGE: &str = "Received invalid JSON response from Appfigures API.";
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Proxy failed to fetch data from Appfigures API.";
pub const BAD_REQUEST_MESSAGE: &str = "Failed to read request body.";
pub const NOT_FOUND_MESSAGE: &str = "Not found.";

/// What the proxy made of an upstream answer. Used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Forwarded,
    UpstreamError,
    InvalidJson,
}

impl Outcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Outcome::Forwarded => "forwarded",
            Outcome::UpstreamError => "upstream_error",
            Outcome::InvalidJson => "invalid_json",
        }
    }
}

pub fn relay_upstream(status: StatusCode, body: &[u8]) -> (Outcome, Response<Bytes>) {
    let parsed = serde_json::from_slice::<Value>(body);

    if status.is_success() {
        return match parsed {
            Ok(value) => (Outcome::Forwarded, json_response(status, &value)),
            Err(e) => {
                tracing::error!(
                    status = %status,
                    error = %e,
                    body = %String::from_utf8_lossy(body),
                    "Upstream success response was not valid JSON"
                );
                (
                    Outcome::InvalidJson,
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, INVALID_JSON_MESSAGE),
                )
            }
        };
    }

    tracing::warn!(
        status = %status,
        body = %String::from_utf8_lossy(body),
        "Upstream returned an error"
    );
    let response = match parsed {
        Ok(value) => json_response(status, &value),
        Err(_) => text_response(status, Bytes::copy_from_slice(body)),
    };
    (Outcome::UpstreamError, response)
}

pub fn json_response(status: StatusCode, value: &Value) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(value.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn error_response(status: StatusCode, message: &str) -> Response<Bytes> {
    json_response(status, &json!({ "error": message }))
}

pub fn transport_failure_response(details: &str) -> Response<Bytes> {
    json_response(
        StatusCode::BAD_GATEWAY,
        &json!({ "error": TRANSPORT_FAILURE_MESSAGE, "details": details }),
    )
}

fn text_response(status: StatusCode, body: Bytes) -> Response<Bytes> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
