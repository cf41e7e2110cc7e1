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

use async_trait::async_trait;

use crate::cache::RangeTransport;

/// One downloadable variant of a resolved resource.
#[derive(Clone)]
pub struct Media {
    pub uid: String,
    pub size: u64,
    pub mime_type: String,
    pub transport: Arc<dyn RangeTransport>,
}

/// What a resolver produces for an identifier it has confirmed it can
/// handle, ordered by preference — the proxy always takes the first
/// variant.
#[derive(Clone)]
pub struct Request {
    pub title: String,
    pub filename: String,
    pub media: Vec<Media>,
}

/// A registered site adapter.
///
/// Resolution is two-phase: [`RangeCacheSource::can_handle`] is a cheap,
/// synchronous predicate tried against every adapter first; only if none
/// match cheaply does the registry fall back to [`RangeCacheSource::confirm`],
/// which may hit the network.
#[async_trait]
pub trait RangeCacheSource: Send + Sync {
    /// Unique identifier for this source (e.g. "http", "generic").
    fn name(&self) -> &str;

    /// Cheap, synchronous check — a prefix or scheme match, never I/O.
    fn can_handle(&self, identifier: &str) -> bool;

    /// Network-confirming match, tried only when no adapter's
    /// `can_handle` matched. Adapters that have no meaningful
    /// confirmation step (because `can_handle` is already authoritative)
    /// return `false` unconditionally.
    async fn confirm(&self, _identifier: &str) -> bool {
        false
    }

    /// Resolves `identifier` into a [`Request`]. Only called on an
    /// adapter that returned `true` from `can_handle` or `confirm`.
    async fn resolve(&self, identifier: &str) -> crate::common::types::AnyResult<Request>;
}
