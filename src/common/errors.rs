// Copyright (c) 2026 mediacache contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Errors raised by the chunked range-cache core.
///
/// Workers absorb transient transport errors themselves (by releasing their
/// claim and letting the supervisor spawn a replacement); only permanent,
/// reader-visible failures surface through this type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The object's supervisor has been quit (via `Cache::remove`); any
    /// in-flight or subsequent operation on its handles fails with this.
    #[error("object was removed from the cache")]
    ObjectRemoved,
    /// `seek` was called with an origin other than start/current/end.
    #[error("unknown seek whence")]
    UnknownWhence,
    /// `seek` resolved to a negative absolute position.
    #[error("seeked to a negative offset")]
    NegativeOffset,
    /// Propagated from the backing file or the range transport.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<CacheError> for std::io::Error {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::ObjectRemoved => {
                std::io::Error::new(std::io::ErrorKind::NotConnected, e.to_string())
            }
            CacheError::UnknownWhence | CacheError::NegativeOffset => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
            }
            CacheError::Io(msg) => std::io::Error::other(msg),
        }
    }
}

/// Exception severity levels, surfaced to API clients alongside a failed
/// resolve/load so they can distinguish "try another source" from "this is
/// broken".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Common,
    Suspicious,
    Fault,
}

/// JSON error response format returned by the proxy's HTTP front door.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// HTTP status code.
    pub status: u16,
    /// HTTP status reason phrase (e.g. "Bad Request").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// The request path that caused the error.
    pub path: String,
}

impl ApiError {
    fn new(status: u16, error: &str, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            status,
            error: error.to_string(),
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(404, "Not Found", message, path)
    }

    pub fn internal(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(500, "Internal Server Error", message, path)
    }

    pub fn service_unavailable(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(503, "Service Unavailable", message, path)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
