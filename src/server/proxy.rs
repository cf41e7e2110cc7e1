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

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use super::app_state::AppState;
use crate::cache::CachedReader;
use crate::common::errors::ApiError;
use crate::common::types::CacheKey;

/// Maps an incoming request path to the upstream URL the site registry
/// should resolve. The proxy is mounted under `/stream/*url`, so the tail
/// of the path *is* the identifier.
async fn proxy(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    headers: HeaderMap,
) -> Response {
    serve(&state, &identifier, &headers).await
}

async fn serve(state: &AppState, identifier: &str, headers: &HeaderMap) -> Response {
    let request = match state.source_manager.resolve(identifier).await {
        Ok(request) => request,
        Err(e) => {
            warn!(identifier, error = %e, "no source resolved this identifier");
            return ApiError::not_found(e.to_string(), identifier).into_response();
        }
    };

    let media = match request.media.into_iter().next() {
        Some(media) => media,
        None => {
            return ApiError::not_found("source produced no media variants", identifier)
                .into_response();
        }
    };

    let object = match state
        .cache
        .get(CacheKey::from(media.uid.clone()), media.transport)
        .await
    {
        Ok(object) => object,
        Err(e) => {
            error!(identifier, error = %e, "failed to open cache object");
            return ApiError::internal(e.to_string(), identifier).into_response();
        }
    };

    let reader = CachedReader::new(object);
    let total = reader.len();

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let (start, end, partial) = match range.and_then(|r| parse_range_header(r, total)) {
        Some((start, end)) => (start, end, true),
        None => (0, total.saturating_sub(1), false),
    };

    if start > end || (total > 0 && start >= total) {
        return Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{total}"))
            .body(Body::empty())
            .unwrap();
    }

    let end = end.min(total.saturating_sub(1));
    let data = match reader.read_range(start, end + 1).await {
        Ok(data) => data,
        Err(e) => {
            error!(identifier, error = %e, "read failed after gating succeeded");
            return ApiError::internal(e.to_string(), identifier).into_response();
        }
    };

    let mut builder = Response::builder()
        .status(if partial {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        })
        .header(header::CONTENT_TYPE, media.mime_type)
        .header(header::CONTENT_LENGTH, data.len().to_string())
        .header(header::ACCEPT_RANGES, "bytes");

    if partial {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{total}"),
        );
    }

    builder.body(Body::from(data)).unwrap()
}

/// Parses a `Range: bytes=a-b` header into an inclusive `[start, end]` byte
/// range, resolving suffix (`bytes=-500`) and open-ended (`bytes=500-`)
/// forms against `total`.
fn parse_range_header(range: &str, total: u64) -> Option<(u64, u64)> {
    let range = range.strip_prefix("bytes=")?;
    let (start_str, end_str) = range.split_once('-')?;

    let start = if start_str.is_empty() {
        let suffix: u64 = end_str.parse().ok()?;
        total.saturating_sub(suffix)
    } else {
        start_str.parse().ok()?
    };

    let end = if end_str.is_empty() || start_str.is_empty() {
        total.saturating_sub(1)
    } else {
        end_str.parse().ok()?
    };

    if start > end {
        return None;
    }

    Some((start, end))
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new().route("/stream/{*identifier}", axum::routing::get(proxy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_range() {
        assert_eq!(parse_range_header("bytes=0-99", 1000), Some((0, 99)));
    }

    #[test]
    fn parses_suffix_range() {
        assert_eq!(parse_range_header("bytes=-500", 1000), Some((500, 999)));
    }

    #[test]
    fn parses_open_ended_range() {
        assert_eq!(parse_range_header("bytes=900-", 1000), Some((900, 999)));
    }

    #[test]
    fn rejects_malformed_range() {
        assert_eq!(parse_range_header("bytes=abc-def", 1000), None);
        assert_eq!(parse_range_header("not-a-range", 1000), None);
    }

    #[test]
    fn rejects_inverted_range() {
        assert_eq!(parse_range_header("bytes=500-100", 1000), None);
    }
}
