//! API-layer error type and its conversion to an HTTP response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use crate::handlers::error_response;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Timeout,
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            ApiError::Timeout => write!(f, "Request Timeout"),
            ApiError::Internal(msg) => write!(f, "Internal Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ecs_core::Error> for ApiError {
    fn from(e: ecs_core::Error) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ecs_recorder::Error> for ApiError {
    fn from(e: ecs_recorder::Error) -> Self {
        match e {
            ecs_recorder::Error::NoKeyframeBefore(_) => ApiError::NotFound(e.to_string()),
            ecs_recorder::Error::Io(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ApiError> for Response<Full<Bytes>> {
    fn from(err: ApiError) -> Self {
        let status = match &err {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Timeout => 408,
            ApiError::Internal(_) => 500,
        };
        let body = serde_json::to_vec(&error_response(status, err.to_string()))
            .unwrap_or_else(|_| b"{\"success\":false}".to_vec());
        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| {
                Response::builder()
                    .status(500)
                    .body(Full::new(Bytes::from_static(b"Internal Server Error")))
                    .expect("fallback response is always well-formed")
            })
    }
}
